//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the log subscriber
//! - converts arguments into domain configuration
//! - runs the pipeline and prints summaries

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{BoundsArgs, Cli, Command, CorrectArgs, FitArgs, InputArgs, ModelArgs, OutputArgs, ScanArgs};
use crate::domain::{DetectorResponse, ModelParameters, ScanAxis, ScanConfig};
use crate::error::Result;

pub mod pipeline;

use pipeline::{CorrectConfig, FitConfig, InputSources, OutputTarget};

/// Entry point for the `centrality` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    match cli.command {
        Command::Scan(args) => handle_scan(&args),
        Command::Fit(args) => handle_fit(&args),
        Command::Bounds(args) => handle_bounds(&args),
        Command::Correct(args) => handle_correct(&args),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `warn` with `--quiet`.
fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_scan(args: &ScanArgs) -> Result<()> {
    let config = scan_config_from_args(args);
    let run = pipeline::run_scan(
        &input_sources_from_args(&args.input),
        &config,
        &output_target_from_args(&args.output),
    )?;
    println!(
        "{}",
        crate::report::format_scan_summary(
            &config,
            &run.results,
            &run.refit,
            &run.bounds,
            run.reweight.as_ref(),
            args.top,
        )
    );
    Ok(())
}

fn handle_fit(args: &FitArgs) -> Result<()> {
    let config = fit_config_from_args(args);
    let run = pipeline::run_fit(
        &input_sources_from_args(&args.input),
        &config,
        &output_target_from_args(&args.output),
    )?;
    println!(
        "{}",
        crate::report::format_fit_summary(&run.refit, config.events, &run.bounds, run.reweight.as_ref())
    );
    Ok(())
}

fn handle_bounds(args: &BoundsArgs) -> Result<()> {
    let bounds = pipeline::run_bounds(
        &args.input_file,
        &args.hist_name,
        args.xsec,
        args.output.as_deref(),
    )?;
    println!("{}", crate::report::format_bounds(&bounds));
    Ok(())
}

fn handle_correct(args: &CorrectArgs) -> Result<()> {
    let results = pipeline::run_correct(&correct_config_from_args(args))?;
    println!("{}", crate::report::format_correction_summary(&results));
    Ok(())
}

fn response_from_args(args: &ModelArgs) -> DetectorResponse {
    DetectorResponse {
        pp_efficiency: args.pp_efficiency,
        aa_efficiency: args.aa_efficiency,
        central_multiplicity: args.cent_mult,
        trigger_bias: args.trig_bias,
        constant_efficiency: args.const_eff,
    }
}

pub fn input_sources_from_args(args: &InputArgs) -> InputSources {
    InputSources {
        glauber_file: args.glauber_file.clone(),
        glauber_name: args.glauber_hist_name.clone(),
        data_file: args.data_file.clone(),
        data_name: args.data_hist_name.clone(),
    }
}

pub fn output_target_from_args(args: &OutputArgs) -> OutputTarget {
    OutputTarget {
        dir: args.out_dir.clone(),
        stem: args.out_file.clone(),
    }
}

pub fn scan_config_from_args(args: &ScanArgs) -> ScanConfig {
    ScanConfig {
        npp: ScanAxis {
            min: args.npp_min,
            max: args.npp_max,
            steps: args.npp_steps,
        },
        k: ScanAxis {
            min: args.k_min,
            max: args.k_max,
            steps: args.k_steps,
        },
        x: ScanAxis {
            min: args.x_min,
            max: args.x_max,
            steps: args.x_steps,
        },
        response: response_from_args(&args.model),
        events: args.events,
        refit_events: args.refit_events,
        norm_mode: args.model.norm,
        chi2_mode: args.model.chi2,
        min_multiplicity: args.model.min_mult,
        seed: args.model.seed,
        keep_histograms: args.save_all,
        reweight_bound: args.model.reweight_bound,
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        params: ModelParameters {
            npp: args.npp,
            k: args.k,
            x: args.x,
            response: response_from_args(&args.model),
        },
        events: args.events,
        norm_mode: args.model.norm,
        chi2_mode: args.model.chi2,
        min_multiplicity: args.model.min_mult,
        seed: args.model.seed,
        reweight_bound: args.model.reweight_bound,
    }
}

pub fn correct_config_from_args(args: &CorrectArgs) -> CorrectConfig {
    CorrectConfig {
        params_file: args.params.clone(),
        events_file: args.events.clone(),
        output_file: args.output.clone(),
        seed: args.seed,
        permissive: args.permissive,
    }
}
