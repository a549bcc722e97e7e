//! File-based configuration.
//!
//! Every section is optional; missing keys take the defaults of the
//! standardization and cut engines.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cosmology::{FlatLambdaCdm, LowRedshiftExpansion};
use crate::cuts::CutThresholds;
use crate::salt2::StandardizationParams;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub standardization: StandardizationParams,
    pub cuts: CutThresholds,
    pub cosmology: CosmologyConfig,
}

/// Reference models for the Hubble residuals of each variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmologyConfig {
    /// Used by the Hubble-diagram variant.
    pub lcdm: FlatLambdaCdm,
    /// Used by the H0 variant.
    pub legacy: LowRedshiftExpansion,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
