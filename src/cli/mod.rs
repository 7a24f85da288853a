//! Command-line parsing for the centrality calibration tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting and correction code: `app` converts these structs into plain domain
//! configuration before anything else runs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Chi2Mode, NormMode, XSecMod};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "centrality",
    version,
    about = "Glauber + NBD centrality calibration and per-event correction"
)]
pub struct Cli {
    /// Only log warnings and errors (RUST_LOG still takes precedence).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grid-scan (npp, k, x) against a reference multiplicity distribution,
    /// refit the best point and derive centrality bounds.
    Scan(ScanArgs),
    /// Fit a single (npp, k, x) point at high statistics.
    Fit(FitArgs),
    /// Derive 16-class centrality thresholds from a multiplicity histogram.
    Bounds(BoundsArgs),
    /// Correct a CSV of events and assign centrality classes.
    Correct(CorrectArgs),
}

/// Where the Glauber table and the reference histogram come from.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Object file holding the Npart x Ncoll table.
    #[arg(long, value_name = "JSON")]
    pub glauber_file: PathBuf,

    /// Name of the Npart x Ncoll table in the Glauber file.
    #[arg(long, default_value = "npartncoll")]
    pub glauber_hist_name: String,

    /// Object file holding the measured reference multiplicity.
    #[arg(long, value_name = "JSON", default_value = "refmult.json")]
    pub data_file: PathBuf,

    /// Name of the reference histogram in the data file.
    #[arg(long, default_value = "refmult")]
    pub data_hist_name: String,
}

/// Detector response and comparison settings shared by `scan` and `fit`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// pp efficiency.
    #[arg(long, default_value_t = 0.98)]
    pub pp_efficiency: f64,

    /// 0-5% central AuAu efficiency.
    #[arg(long, default_value_t = 0.84)]
    pub aa_efficiency: f64,

    /// Average 0-5% central multiplicity.
    #[arg(long, default_value_t = 540.0)]
    pub cent_mult: f64,

    /// Use only the pp efficiency.
    #[arg(long)]
    pub const_eff: bool,

    /// Trigger bias.
    #[arg(long, default_value_t = 1.0)]
    pub trig_bias: f64,

    /// Goodness-of-fit definition.
    #[arg(long, value_enum, default_value_t = Chi2Mode::Domain)]
    pub chi2: Chi2Mode,

    /// How the simulation is scaled onto the reference.
    #[arg(long, value_enum, default_value_t = NormMode::Region)]
    pub norm: NormMode,

    /// Minimum multiplicity included in the comparison.
    #[arg(long, default_value_t = 100.0)]
    pub min_mult: f64,

    /// Random seed.
    #[arg(long, default_value_t = 252452)]
    pub seed: u64,

    /// Multiplicity below which the final ratio is fitted for reweighting.
    #[arg(long, default_value_t = 400.0)]
    pub reweight_bound: f64,
}

/// Output location shared by `scan` and `fit`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Output directory (created if missing).
    #[arg(long, default_value = "tmp")]
    pub out_dir: PathBuf,

    /// Output file name (no extension).
    #[arg(long, default_value = "fit_results")]
    pub out_file: String,
}

#[derive(Debug, Args, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Number of events per lattice point.
    #[arg(long, default_value_t = 100_000)]
    pub events: u64,

    /// Number of events for the refit of the best point.
    #[arg(long, default_value_t = 1_000_000)]
    pub refit_events: u64,

    #[arg(long, default_value_t = 1.0)]
    pub npp_min: f64,
    #[arg(long, default_value_t = 4.0)]
    pub npp_max: f64,
    #[arg(long, default_value_t = 31)]
    pub npp_steps: usize,

    #[arg(long, default_value_t = 1.0)]
    pub k_min: f64,
    #[arg(long, default_value_t = 4.0)]
    pub k_max: f64,
    #[arg(long, default_value_t = 31)]
    pub k_steps: usize,

    #[arg(long, default_value_t = 0.1)]
    pub x_min: f64,
    #[arg(long, default_value_t = 0.4)]
    pub x_max: f64,
    #[arg(long, default_value_t = 31)]
    pub x_steps: usize,

    /// Save every lattice point's simulated histogram.
    #[arg(long)]
    pub save_all: bool,

    /// Number of best points listed in the summary.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Number of simulated events.
    #[arg(long, default_value_t = 1_000_000)]
    pub events: u64,

    /// Mean multiplicity per NBD source.
    #[arg(long, default_value_t = 2.38)]
    pub npp: f64,

    /// NBD shape parameter.
    #[arg(long, default_value_t = 2.0)]
    pub k: f64,

    /// Hard-component fraction.
    #[arg(long, default_value_t = 0.13)]
    pub x: f64,
}

#[derive(Debug, Args, Clone)]
pub struct BoundsArgs {
    /// Object file holding the simulated multiplicity.
    #[arg(long, value_name = "JSON", default_value = "glauber.json")]
    pub input_file: PathBuf,

    /// Name of the simulated multiplicity histogram.
    #[arg(long, default_value = "glauber")]
    pub hist_name: String,

    /// Only derive bounds for this cross-section (default: all three).
    #[arg(long, value_enum)]
    pub xsec: Option<XSecMod>,

    /// Write the bounds as JSON.
    #[arg(long, value_name = "JSON")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CorrectArgs {
    /// Correction parameter file (JSON).
    #[arg(long, value_name = "JSON")]
    pub params: PathBuf,

    /// Input events (CSV: runid,refmult,zdc,vz).
    #[arg(long, value_name = "CSV")]
    pub events: PathBuf,

    /// Corrected events (CSV: refmultcorr,cent16,cent9,weight).
    #[arg(long, value_name = "CSV")]
    pub output: PathBuf,

    /// Seed for the multiplicity dithering.
    #[arg(long, default_value_t = 252452)]
    pub seed: u64,

    /// Accept incomplete parameters; every event then gets zero weight.
    #[arg(long)]
    pub permissive: bool,
}
