use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data::model::{fields, FitresTable};
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::salt2::VarianceInputs;

pub const DEFAULT_FITPROB_MIN: f64 = 0.001;
pub const DEFAULT_TREST_MAX: f64 = 5.0;

/// Rest-frame coverage threshold of the Foundation cuts. Fixed, whatever
/// [`CutThresholds::trestmax`] says.
pub const FOUND_TREST_MAX: f64 = 5.0;

pub const X1_LIMIT: f64 = 3.0;
pub const C_LIMIT: f64 = 0.3;
pub const X1_ERR_MAX: f64 = 1.0;

pub const TREST_MISSING_WARNING: &str = "Keyword TrestMAX not found!!!";
pub const TREST_NOT_NUMERIC_WARNING: &str = "Keyword TrestMAX is not numeric, ignoring it";

// ---------------------------------------------------------------------------
// Thresholds and policy
// ---------------------------------------------------------------------------

/// Tunable cut thresholds. Unset redshift bounds fall back to the sample's
/// own redshift range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutThresholds {
    pub zmin: Option<f64>,
    pub zmax: Option<f64>,
    pub fitprobmin: f64,
    /// Only read by [`CutPolicy::General`].
    pub trestmax: f64,
}

impl Default for CutThresholds {
    fn default() -> Self {
        Self {
            zmin: None,
            zmax: None,
            fitprobmin: DEFAULT_FITPROB_MIN,
            trestmax: DEFAULT_TREST_MAX,
        }
    }
}

/// Which fixed cut set to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutPolicy {
    /// `PKMJDERR < 2(1+z)`, `TrestMAX > trestmax`.
    General,
    /// Foundation: `PKMJDERR < 1(1+z)`, `TrestMAX > 5`.
    Found,
}

impl CutPolicy {
    fn pkmjd_factor(self) -> f64 {
        match self {
            CutPolicy::General => 2.0,
            CutPolicy::Found => 1.0,
        }
    }

    fn trest_threshold(self, thresholds: &CutThresholds) -> f64 {
        match self {
            CutPolicy::General => thresholds.trestmax,
            CutPolicy::Found => FOUND_TREST_MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Mask and selection
// ---------------------------------------------------------------------------

/// Row mask of supernovae passing every quality cut.
///
/// A row passes when all of these hold:
/// * `-3 < x1 < 3` and `-0.3 < c < 0.3`
/// * `x1ERR < 1`
/// * `PKMJDERR < K(1+z)` with `K` from the policy
/// * `FITPROB >= fitprobmin`
/// * positive inverse variance at (`alpha`, `beta`)
/// * `zmin <= z <= zmax`
/// * `TrestMAX > threshold`, only when the table has a `TrestMAX` column
///
/// A missing or non-numeric `TrestMAX` column drops that predicate and sends
/// one warning to `sink`. NaN in any tested field fails the row. `mB` and
/// `HOST_LOGMASS` are never read.
pub fn cut_mask(
    table: &FitresTable,
    alpha: f64,
    beta: f64,
    thresholds: &CutThresholds,
    policy: CutPolicy,
    sink: &mut dyn DiagnosticSink,
) -> Result<Vec<bool>> {
    let x1 = table.floats(fields::X1)?;
    let c = table.floats(fields::C)?;
    let z = table.floats(fields::Z_HD)?;
    let errors = VarianceInputs::from_table(table)?;
    let fitprob = table.floats(fields::FITPROB)?;
    let pkmjd_err = table.floats(fields::PKMJD_ERR)?;

    let trest = match table.column(fields::TREST_MAX) {
        Some(column) => {
            let values = column.as_floats();
            if values.is_none() {
                sink.warn(TREST_NOT_NUMERIC_WARNING);
            }
            values
        }
        None => {
            sink.warn(TREST_MISSING_WARNING);
            None
        }
    };
    let trest_min = policy.trest_threshold(thresholds);

    let (data_zmin, data_zmax) = table.range(fields::Z_HD)?;
    let zmin = thresholds.zmin.unwrap_or(data_zmin);
    let zmax = thresholds.zmax.unwrap_or(data_zmax);
    let k = policy.pkmjd_factor();
    debug!("cut_mask: {policy:?} cuts, z in [{zmin}, {zmax}]");

    let mask = (0..table.len())
        .map(|i| {
            let (x1, c, z) = (x1[i], c[i], z[i]);
            -X1_LIMIT < x1
                && x1 < X1_LIMIT
                && -C_LIMIT < c
                && c < C_LIMIT
                && errors.x1err[i] < X1_ERR_MAX
                && pkmjd_err[i] < k * (1.0 + z)
                && fitprob[i] >= thresholds.fitprobmin
                && errors.inverse_variance(i, alpha, beta) > 0.0
                && zmin <= z
                && z <= zmax
                && trest.map_or(true, |t| t[i] > trest_min)
        })
        .collect();
    Ok(mask)
}

/// Apply the cuts of `policy` and return the surviving rows.
pub fn apply_cuts(
    table: &FitresTable,
    alpha: f64,
    beta: f64,
    thresholds: &CutThresholds,
    policy: CutPolicy,
    sink: &mut dyn DiagnosticSink,
) -> Result<FitresTable> {
    let mask = cut_mask(table, alpha, beta, thresholds, policy, sink)?;
    let cut = table.select(&mask)?;
    info!("{policy:?} cuts kept {} of {} SNe", cut.len(), table.len());
    Ok(cut)
}

/// General quality cuts.
pub fn mkcuts(
    table: &FitresTable,
    alpha: f64,
    beta: f64,
    thresholds: &CutThresholds,
    sink: &mut dyn DiagnosticSink,
) -> Result<FitresTable> {
    apply_cuts(table, alpha, beta, thresholds, CutPolicy::General, sink)
}

/// Foundation quality cuts.
pub fn mkfoundcuts(
    table: &FitresTable,
    alpha: f64,
    beta: f64,
    thresholds: &CutThresholds,
    sink: &mut dyn DiagnosticSink,
) -> Result<FitresTable> {
    apply_cuts(table, alpha, beta, thresholds, CutPolicy::Found, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;
    use crate::error::Salt2Error;
    use crate::salt2::{DEFAULT_ALPHA, DEFAULT_BETA};

    fn table(x1: Vec<f64>, with_trest: bool) -> FitresTable {
        let n = x1.len();
        let mut t = FitresTable::new();
        t.insert_column(
            fields::CID,
            Column::Text((0..n).map(|i| format!("SN{i}")).collect()),
        )
        .unwrap();
        t.insert_floats(fields::X1, x1).unwrap();
        for (name, value) in [
            (fields::X1_ERR, 0.2),
            (fields::C, 0.0),
            (fields::C_ERR, 0.03),
            (fields::MB, 17.0),
            (fields::MB_ERR, 0.05),
            (fields::X0, 3.0e-4),
            (fields::COV_X1_C, 0.0),
            (fields::COV_X1_X0, 0.0),
            (fields::COV_C_X0, 0.0),
            (fields::HOST_LOGMASS, 10.2),
            (fields::FITPROB, 0.5),
            (fields::PKMJD_ERR, 0.5),
        ] {
            t.insert_floats(name, vec![value; n]).unwrap();
        }
        t.insert_floats(fields::Z_HD, (0..n).map(|i| 0.02 + 0.01 * i as f64).collect())
            .unwrap();
        if with_trest {
            t.insert_floats(fields::TREST_MAX, vec![20.0; n]).unwrap();
        }
        t
    }

    fn run(
        t: &FitresTable,
        thresholds: &CutThresholds,
        policy: CutPolicy,
    ) -> (FitresTable, Vec<String>) {
        let mut warnings: Vec<String> = Vec::new();
        let cut = apply_cuts(
            t,
            DEFAULT_ALPHA,
            DEFAULT_BETA,
            thresholds,
            policy,
            &mut warnings,
        )
        .unwrap();
        (cut, warnings)
    }

    #[test]
    fn out_of_range_stretch_is_removed() {
        let t = table(vec![0.0, 0.0, 5.0], true);
        let (cut, warnings) = run(&t, &CutThresholds::default(), CutPolicy::General);
        assert_eq!(cut.len(), 2);
        assert_eq!(
            cut.column(fields::CID),
            Some(&Column::Text(vec!["SN0".into(), "SN1".into()]))
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn cuts_are_idempotent() {
        let mut t = table(vec![0.0, 2.9, -3.5, 1.0, 0.3], true);
        let mut c = t.floats(fields::C).unwrap().to_vec();
        c[3] = 0.31;
        t.insert_floats(fields::C, c).unwrap();
        let thresholds = CutThresholds {
            zmin: Some(0.025),
            zmax: Some(0.065),
            ..CutThresholds::default()
        };
        for policy in [CutPolicy::General, CutPolicy::Found] {
            let (once, _) = run(&t, &thresholds, policy);
            let (twice, _) = run(&once, &thresholds, policy);
            assert_eq!(once, twice);
            assert_eq!(once.floats(fields::X1).unwrap(), &[2.9, 0.3]);
        }
    }

    #[test]
    fn missing_trest_warns_once_and_still_cuts() {
        let t = table(vec![0.0, 0.0, 5.0], false);
        let (cut, warnings) = run(&t, &CutThresholds::default(), CutPolicy::General);
        assert_eq!(cut.len(), 2);
        assert_eq!(warnings, vec![TREST_MISSING_WARNING.to_string()]);
        assert!(!cut.has_column(fields::TREST_MAX));
    }

    #[test]
    fn found_policy_hardcodes_trest_threshold() {
        let mut t = table(vec![0.0, 0.0], true);
        t.insert_floats(fields::TREST_MAX, vec![4.0, 8.0]).unwrap();
        let lax = CutThresholds {
            trestmax: 1.0,
            ..CutThresholds::default()
        };
        let (general, _) = run(&t, &lax, CutPolicy::General);
        let (found, _) = run(&t, &lax, CutPolicy::Found);
        assert_eq!(general.len(), 2);
        assert_eq!(found.floats(fields::TREST_MAX).unwrap(), &[8.0]);
    }

    #[test]
    fn found_policy_tightens_peak_date_error() {
        let mut t = table(vec![0.0, 0.0], true);
        t.insert_floats(fields::PKMJD_ERR, vec![0.5, 1.5]).unwrap();
        let (general, _) = run(&t, &CutThresholds::default(), CutPolicy::General);
        let (found, _) = run(&t, &CutThresholds::default(), CutPolicy::Found);
        assert_eq!(general.len(), 2);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn redshift_bounds_default_to_sample_range() {
        let t = table(vec![0.0; 4], true);
        let (all, _) = run(&t, &CutThresholds::default(), CutPolicy::General);
        assert_eq!(all.len(), 4);

        let bounded = CutThresholds {
            zmin: Some(0.025),
            zmax: Some(0.045),
            ..CutThresholds::default()
        };
        let (cut, _) = run(&t, &bounded, CutPolicy::General);
        assert_eq!(cut.floats(fields::Z_HD).unwrap().len(), 2);
    }

    #[test]
    fn low_fit_probability_and_negative_variance_fail() {
        let mut t = table(vec![0.0, 0.0, 0.0], true);
        t.insert_floats(fields::FITPROB, vec![0.001, 0.0009, 0.5]).unwrap();
        t.insert_floats(fields::COV_X1_C, vec![0.0, 0.0, 1.0]).unwrap();
        let (cut, _) = run(&t, &CutThresholds::default(), CutPolicy::General);
        assert_eq!(cut.len(), 1);
        assert_eq!(cut.floats(fields::FITPROB).unwrap(), &[0.001]);
    }

    fn without(t: &FitresTable, dropped: &str) -> FitresTable {
        let mut out = FitresTable::new();
        for name in t.column_names().iter().filter(|n| n.as_str() != dropped) {
            out.insert_column(name.clone(), t.column(name).unwrap().clone())
                .unwrap();
        }
        out
    }

    #[test]
    fn cuts_never_read_peak_magnitude_or_host_mass() {
        let full = table(vec![0.0, 0.0, 5.0], true);
        let mut t = without(&full, fields::MB);
        t.insert_column(
            fields::HOST_LOGMASS,
            Column::Text(vec!["10.5".into(), "".into(), "n/a".into()]),
        )
        .unwrap();

        let (cut, warnings) = run(&t, &CutThresholds::default(), CutPolicy::General);
        assert_eq!(cut.len(), 2);
        assert!(!cut.has_column(fields::MB));
        assert!(warnings.is_empty());
    }

    #[test]
    fn text_trest_column_warns_once_and_is_ignored() {
        let mut t = table(vec![0.0, 0.0, 5.0], false);
        t.insert_column(
            fields::TREST_MAX,
            Column::Text(vec!["1".into(), "?".into(), "30".into()]),
        )
        .unwrap();
        let (cut, warnings) = run(&t, &CutThresholds::default(), CutPolicy::Found);
        assert_eq!(cut.len(), 2);
        assert_eq!(warnings, vec![TREST_NOT_NUMERIC_WARNING.to_string()]);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let mut t = FitresTable::new();
        t.insert_floats(fields::Z_HD, vec![0.1]).unwrap();
        let mut warnings: Vec<String> = Vec::new();
        let err = mkcuts(&t, 0.14, 3.1, &CutThresholds::default(), &mut warnings).unwrap_err();
        assert!(matches!(err, Salt2Error::MissingField(_)));
    }
}
