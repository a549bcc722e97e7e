//! SALT2 distance moduli and quality cuts for Type Ia supernova samples.
//!
//! * [`salt2`] – standardization of light-curve fit parameters into distance
//!   moduli with propagated uncertainties and Hubble residuals.
//! * [`cuts`] – the fixed quality-cut policies used to prune a sample.
//! * [`data`] – the columnar fit table plus FITRES/CSV/JSON/Parquet I/O.
//! * [`cosmology`] – reference models for the residuals.

pub mod cli;
pub mod config;
pub mod cosmology;
pub mod cuts;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod salt2;

pub use error::{Result, Salt2Error};
