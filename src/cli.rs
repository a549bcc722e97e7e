//! Command-line definitions and handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use crate::config::Config;
use crate::cuts::{apply_cuts, CutPolicy, CutThresholds};
use crate::data::loader::load_file;
use crate::data::model::FitresTable;
use crate::data::writer::save_file;
use crate::diagnostics::LogSink;
use crate::salt2::{getmu, getmu_h0, StandardizationParams};

/// SALT2 distance moduli and quality cuts for SN Ia fit tables
#[derive(Parser, Debug)]
#[command(name = "salt2mu", version)]
#[command(after_help = "\
Examples:
  salt2mu mu lowz.fitres -o lowz_mu.fitres             Distance moduli with default nuisance parameters
  salt2mu mu found.fitres -o out.csv --cuts found       Foundation cuts, then distance moduli
  salt2mu mu cal.fitres -o cal.fitres --h0              H0 calibration variant
  salt2mu cuts sample.parquet -o cut.parquet --zmin 0.01
  salt2mu init-config -o salt2mu.toml                   Write the default configuration")]
pub struct Cli {
    /// TOML configuration file (flags override its values)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute mu, muerr and mures for every SN, optionally after quality cuts
    Mu {
        /// Input fit table (.fitres, .txt, .dat, .csv, .json, .parquet)
        input: PathBuf,

        /// Output file; format follows the extension
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Use the H0 calibration variant (M0 = 19.233, 0.05 mag floor)
        #[arg(long)]
        h0: bool,

        /// Quality cuts to apply before standardizing
        #[arg(long, value_enum, default_value = "none")]
        cuts: CutChoice,

        #[command(flatten)]
        params: ParamArgs,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Apply quality cuts only
    Cuts {
        input: PathBuf,

        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Foundation cuts (PKMJDERR < 1+z, TrestMAX > 5)
        #[arg(long)]
        found: bool,

        /// Stretch coefficient used for the inverse-variance cut
        #[arg(long)]
        alpha: Option<f64>,

        /// Colour coefficient used for the inverse-variance cut
        #[arg(long)]
        beta: Option<f64>,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Write the default configuration as TOML
    InitConfig {
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutChoice {
    None,
    General,
    Found,
}

impl CutChoice {
    fn policy(self) -> Option<CutPolicy> {
        match self {
            CutChoice::None => None,
            CutChoice::General => Some(CutPolicy::General),
            CutChoice::Found => Some(CutPolicy::Found),
        }
    }
}

/// Standardization overrides
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    #[arg(long)]
    pub alpha: Option<f64>,
    #[arg(long)]
    pub beta: Option<f64>,
    /// Intrinsic scatter (0 disables)
    #[arg(long)]
    pub sigint: Option<f64>,
    /// Host-mass step (0 disables)
    #[arg(long)]
    pub deltam: Option<f64>,
    /// Peculiar-velocity redshift uncertainty
    #[arg(long)]
    pub peczerr: Option<f64>,
}

impl ParamArgs {
    fn apply(&self, params: &mut StandardizationParams) {
        if let Some(alpha) = self.alpha {
            params.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            params.beta = beta;
        }
        if self.sigint.is_some() {
            params.sigint = self.sigint;
        }
        if self.deltam.is_some() {
            params.deltam = self.deltam;
        }
        if let Some(peczerr) = self.peczerr {
            params.peczerr = peczerr;
        }
    }
}

/// Cut threshold overrides
#[derive(Args, Debug, Clone, Default)]
pub struct ThresholdArgs {
    #[arg(long)]
    pub zmin: Option<f64>,
    #[arg(long)]
    pub zmax: Option<f64>,
    #[arg(long)]
    pub fitprobmin: Option<f64>,
    /// TrestMAX threshold (general cuts only)
    #[arg(long)]
    pub trestmax: Option<f64>,
}

impl ThresholdArgs {
    fn apply(&self, thresholds: &mut CutThresholds) {
        if self.zmin.is_some() {
            thresholds.zmin = self.zmin;
        }
        if self.zmax.is_some() {
            thresholds.zmax = self.zmax;
        }
        if let Some(fitprobmin) = self.fitprobmin {
            thresholds.fitprobmin = fitprobmin;
        }
        if let Some(trestmax) = self.trestmax {
            thresholds.trestmax = trestmax;
        }
    }
}

/// Run the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Mu {
            input,
            output,
            h0,
            cuts,
            params,
            thresholds,
        } => {
            params.apply(&mut config.standardization);
            thresholds.apply(&mut config.cuts);
            let table = load(&input)?;
            let mut table = match cuts.policy() {
                Some(policy) => cut(&table, &config, policy)?,
                None => table,
            };
            if h0 {
                getmu_h0(&mut table, &config.standardization, &config.cosmology.legacy)?;
            } else {
                getmu(&mut table, &config.standardization, &config.cosmology.lcdm)?;
            }
            info!("standardized {} SNe", table.len());
            save_file(&table, &output).with_context(|| format!("saving {}", output.display()))
        }
        Commands::Cuts {
            input,
            output,
            found,
            alpha,
            beta,
            thresholds,
        } => {
            ParamArgs {
                alpha,
                beta,
                ..ParamArgs::default()
            }
            .apply(&mut config.standardization);
            thresholds.apply(&mut config.cuts);
            let policy = if found {
                CutPolicy::Found
            } else {
                CutPolicy::General
            };
            let table = cut(&load(&input)?, &config, policy)?;
            save_file(&table, &output).with_context(|| format!("saving {}", output.display()))
        }
        Commands::InitConfig { output } => {
            let text = Config::default().to_toml()?;
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("writing {}", path.display())),
                None => {
                    print!("{text}");
                    Ok(())
                }
            }
        }
    }
}

fn load(path: &Path) -> Result<FitresTable> {
    load_file(path).with_context(|| format!("loading {}", path.display()))
}

fn cut(table: &FitresTable, config: &Config, policy: CutPolicy) -> Result<FitresTable> {
    let params = &config.standardization;
    Ok(apply_cuts(
        table,
        params.alpha,
        params.beta,
        &config.cuts,
        policy,
        &mut LogSink,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::parse_from([
            "salt2mu", "mu", "in.fitres", "-o", "out.csv", "--alpha", "0.16", "--sigint", "0",
            "--cuts", "found", "--zmax", "0.1",
        ]);
        let Commands::Mu {
            cuts,
            params,
            thresholds,
            ..
        } = cli.command
        else {
            panic!("expected mu command");
        };
        let mut config = Config::default();
        params.apply(&mut config.standardization);
        thresholds.apply(&mut config.cuts);
        assert_eq!(cuts, CutChoice::Found);
        assert_eq!(config.standardization.alpha, 0.16);
        assert_eq!(config.standardization.beta, 3.13);
        assert_eq!(config.standardization.sigint, Some(0.0));
        assert_eq!(config.cuts.zmax, Some(0.1));
        assert_eq!(config.cuts.zmin, None);
    }
}
