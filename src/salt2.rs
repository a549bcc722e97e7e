//! SALT2 standardization: light-curve fit parameters → distance modulus and
//! its propagated uncertainty.
//!
//! Two variants live side by side:
//!
//! * [`salt2mu`] – Hubble-diagram variant. Absolute magnitude offset
//!   [`M0_HUBBLE`], propagated *variance* used directly, peculiar-velocity
//!   redshift term and optional host-mass step.
//! * [`salt2mu_h0`] – H0 calibration variant. Offset [`M0_H0`], the
//!   propagated variance goes through an *inverse-variance* round trip, no
//!   redshift term, a fixed [`H0_ERR_FLOOR`] added in quadrature and no
//!   host-mass step.
//!
//! Every operation is elementwise; no row sees another. Zero amplitudes,
//! zero redshifts or negative variances are not rejected and show up as
//! NaN/Inf in the affected rows.

use std::f64::consts::LN_10;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cosmology::{Cosmology, LegacyCosmology};
use crate::data::model::{fields, FitresTable};
use crate::error::{Result, Salt2Error};

/// Absolute magnitude offset of the Hubble-diagram variant.
pub const M0_HUBBLE: f64 = 19.36;

/// Absolute magnitude offset of the H0 calibration variant.
///
/// Differs from [`M0_HUBBLE`]; both values are historical and neither is
/// authoritative.
pub const M0_H0: f64 = 19.233;

/// Redshift-proportional systematic floor (lensing and unmodelled
/// peculiar-velocity scatter), in mag per unit redshift.
pub const Z_SCATTER: f64 = 0.055;

/// Fixed uncertainty floor of the H0 variant, in mag.
pub const H0_ERR_FLOOR: f64 = 0.050;

/// Host stellar mass (log10 M/Msun) splitting the mass step.
pub const MASS_STEP_SPLIT: f64 = 10.0;

pub const DEFAULT_ALPHA: f64 = 0.147;
pub const DEFAULT_BETA: f64 = 3.13;
pub const DEFAULT_SIGINT: f64 = 0.1;
pub const DEFAULT_PECZERR: f64 = 0.00083;

// ---------------------------------------------------------------------------
// Parameters and inputs
// ---------------------------------------------------------------------------

/// Nuisance parameters of the standardization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizationParams {
    /// Stretch coefficient.
    pub alpha: f64,
    /// Colour coefficient.
    pub beta: f64,
    /// Intrinsic scatter added in quadrature; `None` or `0` skips it.
    pub sigint: Option<f64>,
    /// Host-mass step size; `None` or `0` skips it.
    pub deltam: Option<f64>,
    /// Peculiar-velocity redshift uncertainty.
    pub peczerr: f64,
}

impl Default for StandardizationParams {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            sigint: Some(DEFAULT_SIGINT),
            deltam: None,
            peczerr: DEFAULT_PECZERR,
        }
    }
}

impl StandardizationParams {
    fn active_sigint(&self) -> Option<f64> {
        self.sigint.filter(|s| *s != 0.0)
    }

    fn active_deltam(&self) -> Option<f64> {
        self.deltam.filter(|d| *d != 0.0)
    }
}

/// Borrowed light-curve fit fields, one slice per parameter.
#[derive(Debug, Clone, Copy)]
pub struct Salt2Inputs<'a> {
    pub x1: &'a [f64],
    pub x1err: &'a [f64],
    pub c: &'a [f64],
    pub cerr: &'a [f64],
    pub mb: &'a [f64],
    pub mberr: &'a [f64],
    pub x0: &'a [f64],
    pub cov_x1_c: &'a [f64],
    pub cov_x1_x0: &'a [f64],
    pub cov_c_x0: &'a [f64],
    /// Only needed when a host-mass step is applied.
    pub hostmass: Option<&'a [f64]>,
    pub z: &'a [f64],
}

impl<'a> Salt2Inputs<'a> {
    /// Borrow the standard FITRES fields of a table.
    pub fn from_table(table: &'a FitresTable) -> Result<Self> {
        Ok(Self {
            x1: table.floats(fields::X1)?,
            x1err: table.floats(fields::X1_ERR)?,
            c: table.floats(fields::C)?,
            cerr: table.floats(fields::C_ERR)?,
            mb: table.floats(fields::MB)?,
            mberr: table.floats(fields::MB_ERR)?,
            x0: table.floats(fields::X0)?,
            cov_x1_c: table.floats(fields::COV_X1_C)?,
            cov_x1_x0: table.floats(fields::COV_X1_X0)?,
            cov_c_x0: table.floats(fields::COV_C_X0)?,
            hostmass: table.optional_floats(fields::HOST_LOGMASS)?,
            z: table.floats(fields::Z_HD)?,
        })
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Check every field has as many rows as `z`.
    pub fn validate(&self) -> Result<()> {
        let expected = self.z.len();
        let named = [
            (fields::X1, self.x1),
            (fields::X1_ERR, self.x1err),
            (fields::C, self.c),
            (fields::C_ERR, self.cerr),
            (fields::MB, self.mb),
            (fields::MB_ERR, self.mberr),
            (fields::X0, self.x0),
            (fields::COV_X1_C, self.cov_x1_c),
            (fields::COV_X1_X0, self.cov_x1_x0),
            (fields::COV_C_X0, self.cov_c_x0),
        ];
        let hostmass = self.hostmass.map(|h| (fields::HOST_LOGMASS, h));
        for (field, values) in named.into_iter().chain(hostmass) {
            if values.len() != expected {
                return Err(Salt2Error::ShapeMismatch {
                    field: field.to_string(),
                    expected,
                    found: values.len(),
                });
            }
        }
        Ok(())
    }

    /// The subset of fields entering the propagated variance.
    pub fn variance_inputs(&self) -> VarianceInputs<'a> {
        VarianceInputs {
            x1err: self.x1err,
            cerr: self.cerr,
            mberr: self.mberr,
            x0: self.x0,
            cov_x1_c: self.cov_x1_c,
            cov_x1_x0: self.cov_x1_x0,
            cov_c_x0: self.cov_c_x0,
        }
    }

    fn variance(&self, i: usize, alpha: f64, beta: f64) -> f64 {
        self.variance_inputs().variance(i, alpha, beta)
    }

    fn raw_mu(&self, i: usize, alpha: f64, beta: f64, m0: f64) -> f64 {
        self.mb[i] + alpha * self.x1[i] - beta * self.c[i] + m0
    }
}

/// Uncertainties and covariances of the fit, without the fitted values.
///
/// This is all the quality cuts need, so a table lacking `mB` or a usable
/// host mass can still be cut.
#[derive(Debug, Clone, Copy)]
pub struct VarianceInputs<'a> {
    pub x1err: &'a [f64],
    pub cerr: &'a [f64],
    pub mberr: &'a [f64],
    pub x0: &'a [f64],
    pub cov_x1_c: &'a [f64],
    pub cov_x1_x0: &'a [f64],
    pub cov_c_x0: &'a [f64],
}

impl<'a> VarianceInputs<'a> {
    pub fn from_table(table: &'a FitresTable) -> Result<Self> {
        Ok(Self {
            x1err: table.floats(fields::X1_ERR)?,
            cerr: table.floats(fields::C_ERR)?,
            mberr: table.floats(fields::MB_ERR)?,
            x0: table.floats(fields::X0)?,
            cov_x1_c: table.floats(fields::COV_X1_C)?,
            cov_x1_x0: table.floats(fields::COV_X1_X0)?,
            cov_c_x0: table.floats(fields::COV_C_X0)?,
        })
    }

    /// Propagated variance of `mb + alpha*x1 - beta*c` for one row.
    ///
    /// The x0 covariances are moved to magnitude space with
    /// `sf = -2.5 / (x0 ln 10)`.
    pub fn variance(&self, i: usize, alpha: f64, beta: f64) -> f64 {
        let sf = amplitude_scale(self.x0[i]);
        let cov_mb_x1 = self.cov_x1_x0[i] * sf;
        let cov_mb_c = self.cov_c_x0[i] * sf;
        self.mberr[i].powi(2)
            + alpha.powi(2) * self.x1err[i].powi(2)
            + beta.powi(2) * self.cerr[i].powi(2)
            + 2.0 * alpha * cov_mb_x1
            - 2.0 * beta * cov_mb_c
            - 2.0 * alpha * beta * self.cov_x1_c[i]
    }

    /// Inverse variance, used as a precision proxy by the quality cuts.
    pub fn inverse_variance(&self, i: usize, alpha: f64, beta: f64) -> f64 {
        1.0 / self.variance(i, alpha, beta)
    }
}

/// Standardized distance moduli and their uncertainties.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardized {
    pub mu: Vec<f64>,
    pub muerr: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Factor converting an x0 covariance into a magnitude covariance.
pub fn amplitude_scale(x0: f64) -> f64 {
    -2.5 / (x0 * LN_10)
}

/// Magnitude-space uncertainty from a redshift uncertainty `peczerr`, via
/// the low-z derivative of the distance modulus.
pub fn redshift_error(peczerr: f64, z: f64) -> f64 {
    peczerr * 5.0 / LN_10 * (1.0 + z) / (z * (1.0 + z / 2.0))
}

/// Mass-step correction for one host.
///
/// Hosts above the split get `+deltam/2`, hosts below get `-deltam/2`.
/// A host exactly at the split (or with NaN mass) is left alone.
pub fn mass_step(hostmass: f64, deltam: f64) -> f64 {
    if hostmass > MASS_STEP_SPLIT {
        deltam / 2.0
    } else if hostmass < MASS_STEP_SPLIT {
        -deltam / 2.0
    } else {
        0.0
    }
}

fn add_sigint(muerr: f64, sigint: Option<f64>) -> f64 {
    match sigint {
        Some(s) => (muerr.powi(2) + s.powi(2)).sqrt(),
        None => muerr,
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Hubble-diagram standardization (`M0 = 19.36`, direct variance).
pub fn salt2mu(inputs: &Salt2Inputs<'_>, params: &StandardizationParams) -> Result<Standardized> {
    inputs.validate()?;
    let StandardizationParams {
        alpha,
        beta,
        peczerr,
        ..
    } = *params;

    let deltam = params.active_deltam();
    let hostmass = match deltam {
        Some(_) => Some(
            inputs
                .hostmass
                .ok_or_else(|| Salt2Error::MissingField(fields::HOST_LOGMASS.to_string()))?,
        ),
        None => None,
    };
    let sigint = params.active_sigint();

    let mut mu = Vec::with_capacity(inputs.len());
    let mut muerr = Vec::with_capacity(inputs.len());
    for (i, &z) in inputs.z.iter().enumerate() {
        let mut m = inputs.raw_mu(i, alpha, beta, M0_HUBBLE);
        if let (Some(d), Some(mass)) = (deltam, hostmass) {
            m += mass_step(mass[i], d);
        }

        let zerr = redshift_error(peczerr, z);
        let var = inputs.variance(i, alpha, beta);
        let err = (var + zerr.powi(2) + Z_SCATTER.powi(2) * z.powi(2)).sqrt();

        mu.push(m);
        muerr.push(add_sigint(err, sigint));
    }

    debug!(
        "salt2mu: standardized {} SNe (alpha={alpha}, beta={beta}, deltam={deltam:?})",
        mu.len()
    );
    Ok(Standardized { mu, muerr })
}

/// H0 calibration standardization (`M0 = 19.233`, inverse-variance round
/// trip, fixed 0.05 mag floor, no redshift term, no mass step).
pub fn salt2mu_h0(
    inputs: &Salt2Inputs<'_>,
    params: &StandardizationParams,
) -> Result<Standardized> {
    inputs.validate()?;
    let (alpha, beta) = (params.alpha, params.beta);
    let sigint = params.active_sigint();
    let zerr = 0.0_f64;

    let mut mu = Vec::with_capacity(inputs.len());
    let mut muerr = Vec::with_capacity(inputs.len());
    for (i, &z) in inputs.z.iter().enumerate() {
        let invvar = inputs.variance_inputs().inverse_variance(i, alpha, beta);
        let err = (1.0 / invvar
            + zerr.powi(2)
            + Z_SCATTER.powi(2) * z.powi(2)
            + H0_ERR_FLOOR.powi(2))
        .sqrt();

        mu.push(inputs.raw_mu(i, alpha, beta, M0_H0));
        muerr.push(add_sigint(err, sigint));
    }

    debug!("salt2mu_h0: standardized {} SNe", mu.len());
    Ok(Standardized { mu, muerr })
}

// ---------------------------------------------------------------------------
// Table wrappers
// ---------------------------------------------------------------------------

fn write_results(table: &mut FitresTable, result: Standardized, mures: Vec<f64>) -> Result<()> {
    table.insert_floats(fields::MU, result.mu)?;
    table.insert_floats(fields::MU_ERR, result.muerr)?;
    table.insert_floats(fields::MU_RES, mures)
}

/// Add `mu`, `muerr` and the Hubble residual `mures` against `cosmology`.
pub fn getmu(
    table: &mut FitresTable,
    params: &StandardizationParams,
    cosmology: &dyn Cosmology,
) -> Result<()> {
    let (result, mures) = {
        let inputs = Salt2Inputs::from_table(table)?;
        let result = salt2mu(&inputs, params)?;
        let mures: Vec<f64> = result
            .mu
            .iter()
            .zip(inputs.z)
            .map(|(mu, &z)| mu - cosmology.distmod(z))
            .collect();
        (result, mures)
    };
    write_results(table, result, mures)
}

/// H0 variant of [`getmu`], residuals taken against a [`LegacyCosmology`].
pub fn getmu_h0(
    table: &mut FitresTable,
    params: &StandardizationParams,
    cosmology: &dyn LegacyCosmology,
) -> Result<()> {
    let (result, mures) = {
        let inputs = Salt2Inputs::from_table(table)?;
        let result = salt2mu_h0(&inputs, params)?;
        let mures: Vec<f64> = result
            .mu
            .iter()
            .zip(inputs.z)
            .map(|(mu, &z)| mu - cosmology.mu(z))
            .collect();
        (result, mures)
    };
    write_results(table, result, mures)
}
