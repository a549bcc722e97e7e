use std::path::PathBuf;

use anyhow::Result;
use salt2mu::cosmology::{Cosmology, FlatLambdaCdm};
use salt2mu::data::model::{fields, Column, FitresTable};
use salt2mu::data::writer::save_file;
use salt2mu::salt2::{DEFAULT_ALPHA, DEFAULT_BETA, M0_HUBBLE};

/// SALT2 convention linking peak B magnitude and amplitude:
/// `mB = -2.5 log10(x0) + MB_ZEROPOINT`.
const MB_ZEROPOINT: f64 = 10.635;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One simulated light-curve fit.
struct SimulatedSn {
    cid: String,
    z: f64,
    x1: f64,
    x1err: f64,
    c: f64,
    cerr: f64,
    mb: f64,
    mberr: f64,
    x0: f64,
    cov_x1_c: f64,
    cov_x1_x0: f64,
    cov_c_x0: f64,
    hostmass: f64,
    fitprob: f64,
    pkmjd_err: f64,
    trest_max: f64,
}

fn simulate(rng: &mut SimpleRng, cosmo: &FlatLambdaCdm, id: usize) -> SimulatedSn {
    let z = rng.uniform(0.01, 0.15);
    // Heavy tails so that some SNe fail the stretch/colour cuts.
    let x1 = rng.gauss(0.0, 1.3);
    let c = rng.gauss(-0.02, 0.1);
    let hostmass = rng.gauss(10.3, 0.6);

    let mb = cosmo.distmod(z) - M0_HUBBLE - DEFAULT_ALPHA * x1 + DEFAULT_BETA * c
        + rng.gauss(0.0, 0.1);
    let x0 = 10f64.powf(-0.4 * (mb - MB_ZEROPOINT));

    let mberr = rng.uniform(0.02, 0.06);
    let x1err = rng.uniform(0.05, 1.2);
    let cerr = rng.uniform(0.02, 0.05);
    // mB and x0 are perfectly anti-correlated: cov(mB, .) = sf * cov(x0, .).
    let sf = -2.5 / (x0 * std::f64::consts::LN_10);
    let cov_mb_x1 = rng.gauss(0.0, 0.3) * mberr * x1err;
    let cov_mb_c = rng.gauss(0.2, 0.2) * mberr * cerr;

    SimulatedSn {
        cid: format!("SIM{id:05}"),
        z,
        x1,
        x1err,
        c,
        cerr,
        mb,
        mberr,
        x0,
        cov_x1_c: rng.gauss(0.0, 0.2) * x1err * cerr,
        cov_x1_x0: cov_mb_x1 / sf,
        cov_c_x0: cov_mb_c / sf,
        hostmass,
        fitprob: rng.next_f64().powi(2),
        pkmjd_err: rng.uniform(0.05, 2.5),
        trest_max: rng.uniform(0.0, 40.0),
    }
}

fn build_table(sne: &[SimulatedSn]) -> Result<FitresTable> {
    let mut table = FitresTable::new();
    table.insert_column(
        fields::CID,
        Column::Text(sne.iter().map(|s| s.cid.clone()).collect()),
    )?;

    let numeric: [(&str, fn(&SimulatedSn) -> f64); 15] = [
        (fields::Z_HD, |s| s.z),
        (fields::X1, |s| s.x1),
        (fields::X1_ERR, |s| s.x1err),
        (fields::C, |s| s.c),
        (fields::C_ERR, |s| s.cerr),
        (fields::MB, |s| s.mb),
        (fields::MB_ERR, |s| s.mberr),
        (fields::X0, |s| s.x0),
        (fields::COV_X1_C, |s| s.cov_x1_c),
        (fields::COV_X1_X0, |s| s.cov_x1_x0),
        (fields::COV_C_X0, |s| s.cov_c_x0),
        (fields::HOST_LOGMASS, |s| s.hostmass),
        (fields::FITPROB, |s| s.fitprob),
        (fields::PKMJD_ERR, |s| s.pkmjd_err),
        (fields::TREST_MAX, |s| s.trest_max),
    ];
    for (name, get) in numeric {
        table.insert_floats(name, sne.iter().map(get).collect())?;
    }
    Ok(table)
}

fn main() -> Result<()> {
    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data.fitres"));
    let n_sne = 300;

    let mut rng = SimpleRng::new(42);
    let cosmo = FlatLambdaCdm::planck15();
    let sne: Vec<SimulatedSn> = (0..n_sne).map(|i| simulate(&mut rng, &cosmo, i)).collect();

    let table = build_table(&sne)?;
    save_file(&table, &output_path)?;

    println!(
        "Wrote {} simulated SNe ({} fields each) to {}",
        table.len(),
        table.column_names().len(),
        output_path.display()
    );
    Ok(())
}
