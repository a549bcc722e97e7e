use approx::assert_relative_eq;
use salt2mu::cosmology::{Cosmology, FlatLambdaCdm, LegacyCosmology, LowRedshiftExpansion};
use salt2mu::cuts::{mkcuts, mkfoundcuts, CutThresholds, TREST_MISSING_WARNING};
use salt2mu::data::loader::load_file;
use salt2mu::data::model::{fields, Column, FitresTable};
use salt2mu::data::writer::save_file;
use salt2mu::salt2::{getmu, getmu_h0, StandardizationParams, M0_H0, M0_HUBBLE};
use tempfile::tempdir;

const FITRES: &str = "\
# three SNe, the last with an out-of-range stretch
NVAR: 17
VARNAMES: CID IDSURVEY zHD x1 x1ERR c cERR mB mBERR x0 COV_x1_c COV_x1_x0 COV_c_x0 HOST_LOGMASS FITPROB PKMJDERR TrestMAX
SN: sn2019a PS1 0.031 0.0 0.15 0.0 0.03 15.90 0.04 1.2e-3 0.0005 -1.0e-6 -3.0e-7 10.5 0.6 0.3 25.0
SN: sn2019b PS1 0.052 0.0 0.20 0.0 0.04 17.05 0.05 4.1e-4 0.0004  2.0e-7 -1.0e-7 9.5 0.4 0.5 21.0
SN: sn2019c DES 0.078 5.0 0.30 0.0 0.04 18.10 0.05 1.6e-4 0.0003  1.0e-7 -5.0e-8 11.0 0.9 0.4 30.0
";

fn load_sample(dir: &std::path::Path) -> FitresTable {
    let path = dir.join("sample.fitres");
    std::fs::write(&path, FITRES).unwrap();
    load_file(&path).unwrap()
}

#[test]
fn cut_then_standardize_end_to_end() {
    let dir = tempdir().unwrap();
    let table = load_sample(dir.path());
    assert_eq!(table.len(), 3);

    let params = StandardizationParams::default();
    let mut warnings: Vec<String> = Vec::new();
    let mut cut = mkcuts(
        &table,
        params.alpha,
        params.beta,
        &CutThresholds::default(),
        &mut warnings,
    )
    .unwrap();
    assert!(warnings.is_empty());
    assert_eq!(
        cut.column(fields::CID),
        Some(&Column::Text(vec!["sn2019a".into(), "sn2019b".into()]))
    );
    assert_eq!(
        cut.column("IDSURVEY"),
        Some(&Column::Text(vec!["PS1".into(), "PS1".into()]))
    );

    let cosmo = FlatLambdaCdm::planck15();
    getmu(&mut cut, &params, &cosmo).unwrap();

    let mu = cut.floats(fields::MU).unwrap();
    let mures = cut.floats(fields::MU_RES).unwrap();
    let muerr = cut.floats(fields::MU_ERR).unwrap();
    assert_relative_eq!(mu[0], 15.90 + M0_HUBBLE, epsilon = 1e-12);
    assert_relative_eq!(mures[1], mu[1] - cosmo.distmod(0.052), epsilon = 1e-12);
    assert!(muerr.iter().all(|e| e.is_finite() && *e > 0.1));
    assert_eq!(cut.column_names().last().map(String::as_str), Some("mures"));
}

#[test]
fn foundation_cuts_without_trest_warn_once() {
    let dir = tempdir().unwrap();
    let table = load_sample(dir.path());

    let mut trimmed = FitresTable::new();
    for name in table.column_names() {
        if name != fields::TREST_MAX {
            trimmed
                .insert_column(name.clone(), table.column(name).unwrap().clone())
                .unwrap();
        }
    }

    let mut warnings: Vec<String> = Vec::new();
    let cut = mkfoundcuts(&trimmed, 0.147, 3.13, &CutThresholds::default(), &mut warnings).unwrap();
    assert_eq!(warnings, vec![TREST_MISSING_WARNING.to_string()]);
    // PKMJDERR 0.5 < 1.052 and 0.3 < 1.031 both survive; x1 = 5 does not.
    assert_eq!(cut.len(), 2);
}

#[test]
fn h0_variant_differs_from_hubble_variant() {
    let dir = tempdir().unwrap();
    let mut a = load_sample(dir.path());
    let mut b = a.clone();
    let params = StandardizationParams::default();

    getmu(&mut a, &params, &FlatLambdaCdm::planck15()).unwrap();
    let legacy = LowRedshiftExpansion::default();
    getmu_h0(&mut b, &params, &legacy).unwrap();

    let (mu_a, mu_b) = (a.floats(fields::MU).unwrap(), b.floats(fields::MU).unwrap());
    let (err_a, err_b) = (
        a.floats(fields::MU_ERR).unwrap(),
        b.floats(fields::MU_ERR).unwrap(),
    );
    for i in 0..a.len() {
        assert_relative_eq!(mu_a[i] - mu_b[i], M0_HUBBLE - M0_H0, epsilon = 1e-9);
        assert_ne!(err_a[i], err_b[i]);
    }
    let mures_b = b.floats(fields::MU_RES).unwrap();
    assert_relative_eq!(mures_b[0], mu_b[0] - legacy.mu(0.031), epsilon = 1e-12);
}

#[test]
fn annotated_table_survives_every_output_format() {
    let dir = tempdir().unwrap();
    let mut table = load_sample(dir.path());
    getmu(
        &mut table,
        &StandardizationParams::default(),
        &FlatLambdaCdm::planck15(),
    )
    .unwrap();

    for ext in ["fitres", "csv", "json", "parquet"] {
        let path = dir.path().join(format!("out.{ext}"));
        save_file(&table, &path).unwrap();
        let back = load_file(&path).unwrap();
        assert_eq!(back.len(), table.len(), "{ext}");
        for name in [fields::CID, fields::Z_HD, fields::MU, fields::MU_ERR] {
            assert!(back.has_column(name), "{ext}: {name}");
        }
        let (got, want) = (
            back.floats(fields::MU).unwrap(),
            table.floats(fields::MU).unwrap(),
        );
        for (g, w) in got.iter().zip(want) {
            assert_relative_eq!(*g, *w, epsilon = 1e-9);
        }
    }
}
