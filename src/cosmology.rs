//! Reference cosmologies used to turn a redshift into a predicted distance
//! modulus. Providers are always passed explicitly to the engines.

use serde::{Deserialize, Serialize};

/// Speed of light in km/s.
pub const C_KM_S: f64 = 299_792.458;

/// Simpson intervals used for the comoving-distance integral (must be even).
const INTEGRATION_STEPS: usize = 1000;

/// Distance modulus as a function of redshift, in magnitudes.
pub trait Cosmology {
    fn distmod(&self, z: f64) -> f64;
}

/// Simplified low-redshift modulus used by the H0 calibration path.
///
/// Not required to agree with [`Cosmology::distmod`] for the same model.
pub trait LegacyCosmology {
    fn mu(&self, z: f64) -> f64;
}

// ---------------------------------------------------------------------------
// Flat ΛCDM
// ---------------------------------------------------------------------------

/// Spatially flat ΛCDM with matter and dark energy only (no radiation or
/// massive neutrinos).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatLambdaCdm {
    /// Hubble constant in km/s/Mpc.
    pub h0: f64,
    /// Matter density today.
    pub om0: f64,
}

impl FlatLambdaCdm {
    pub fn new(h0: f64, om0: f64) -> Self {
        Self { h0, om0 }
    }

    /// Planck 2015 (TT,TE,EE+lowP+lensing+ext) parameters.
    pub fn planck15() -> Self {
        Self::new(67.74, 0.3075)
    }

    /// Dimensionless Hubble rate E(z) = H(z)/H0.
    fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        (self.om0 * zp1 * zp1 * zp1 + (1.0 - self.om0)).sqrt()
    }

    /// Line-of-sight comoving distance in Mpc.
    pub fn comoving_distance(&self, z: f64) -> f64 {
        if z == 0.0 {
            return 0.0;
        }
        let n = INTEGRATION_STEPS;
        let h = z / n as f64;
        let inv_e = |x: f64| 1.0 / self.efunc(x);
        let mut sum = inv_e(0.0) + inv_e(z);
        for i in 1..n {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * inv_e(i as f64 * h);
        }
        C_KM_S / self.h0 * sum * h / 3.0
    }

    /// Luminosity distance in Mpc.
    pub fn luminosity_distance(&self, z: f64) -> f64 {
        (1.0 + z) * self.comoving_distance(z)
    }
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self::planck15()
    }
}

impl Cosmology for FlatLambdaCdm {
    fn distmod(&self, z: f64) -> f64 {
        5.0 * self.luminosity_distance(z).log10() + 25.0
    }
}

// ---------------------------------------------------------------------------
// Kinematic low-z expansion
// ---------------------------------------------------------------------------

/// Third-order kinematic expansion of the luminosity distance in terms of
/// the deceleration (`q0`) and jerk (`j0`) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowRedshiftExpansion {
    pub h0: f64,
    pub q0: f64,
    pub j0: f64,
}

impl LowRedshiftExpansion {
    pub fn new(h0: f64, q0: f64, j0: f64) -> Self {
        Self { h0, q0, j0 }
    }

    pub fn luminosity_distance(&self, z: f64) -> f64 {
        let (q0, j0) = (self.q0, self.j0);
        C_KM_S * z / self.h0
            * (1.0 + 0.5 * (1.0 - q0) * z - (1.0 - q0 - 3.0 * q0 * q0 + j0) * z * z / 6.0)
    }
}

impl Default for LowRedshiftExpansion {
    fn default() -> Self {
        Self::new(70.0, -0.55, 1.0)
    }
}

impl LegacyCosmology for LowRedshiftExpansion {
    fn mu(&self, z: f64) -> f64 {
        5.0 * self.luminosity_distance(z).log10() + 25.0
    }
}
