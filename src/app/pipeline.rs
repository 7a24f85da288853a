//! Shared pipeline logic behind every subcommand.
//!
//! Keeping this in one place keeps the workflows testable without a CLI:
//! load inputs -> scan/fit -> refit -> centrality bounds and reweighting -> write outputs
//!
//! `app` only converts arguments and prints summaries.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::centrality::{
    EventCorrector, ReweightFit, WeightFitConfig, centrality_bounds, fit_reweight,
};
use crate::domain::{
    Chi2Mode, EventCorrectionResult, ModelParameters, NormMode, ScanConfig, XSecMod,
};
use crate::error::{CalibError, Result};
use crate::fit::{
    FinalComparison, GridScanner, HistogramComparator, ScanResultSet, refit_best, refit_point,
};
use crate::io::{
    BoundsSummary, RunSummary, histogram_document, read_correction_parameters, read_events,
    read_histogram, read_table, write_bounds_json, write_corrected,
};
use crate::math::{Histogram1D, ParticipantCollisionTable};
use crate::random::RandomSource;

/// Where the Glauber table and the reference distribution are stored.
#[derive(Debug, Clone)]
pub struct InputSources {
    pub glauber_file: PathBuf,
    pub glauber_name: String,
    pub data_file: PathBuf,
    pub data_name: String,
}

/// Output directory and file stem for scan/fit results.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub stem: String,
}

impl OutputTarget {
    /// Histogram object file (`refmult`, `glauber`, `ratio`, per-point histograms).
    pub fn histogram_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("{}_summary.json", self.stem))
    }

    fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| CalibError::file(&self.dir, e))
    }
}

/// Single-point fit settings.
#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub params: ModelParameters,
    pub events: u64,
    pub norm_mode: NormMode,
    pub chi2_mode: Chi2Mode,
    pub min_multiplicity: f64,
    pub seed: u64,
    pub reweight_bound: f64,
}

/// Event correction settings.
#[derive(Debug, Clone)]
pub struct CorrectConfig {
    pub params_file: PathBuf,
    pub events_file: PathBuf,
    pub output_file: PathBuf,
    pub seed: u64,
    /// Accept incomplete correction parameters (all events get zero weight).
    pub permissive: bool,
}

#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub results: ScanResultSet,
    pub refit: FinalComparison,
    pub bounds: BoundsSummary,
    pub reweight: Option<ReweightFit>,
}

#[derive(Debug, Clone)]
pub struct FitOutput {
    pub refit: FinalComparison,
    pub bounds: BoundsSummary,
    pub reweight: Option<ReweightFit>,
}

/// Load the Glauber table and the reference histogram.
pub fn load_inputs(inputs: &InputSources) -> Result<(ParticipantCollisionTable, Histogram1D)> {
    let table = read_table(&inputs.glauber_file, &inputs.glauber_name)?;
    let reference = read_histogram(&inputs.data_file, &inputs.data_name)?;
    info!(
        table = %inputs.glauber_file.display(),
        npart_bins = table.npart_axis().bins,
        ncoll_bins = table.ncoll_axis().bins,
        reference = %inputs.data_file.display(),
        bins = reference.n_bins(),
        entries = reference.integral(),
        "loaded inputs"
    );
    Ok((table, reference))
}

/// Scan the lattice, refit the best point and write all outputs.
///
/// Both documents are serialized before anything is written, so a failed
/// scan, refit or serialization leaves no files behind.
pub fn run_scan(
    inputs: &InputSources,
    config: &ScanConfig,
    output: &OutputTarget,
) -> Result<ScanOutput> {
    let (table, reference) = load_inputs(inputs)?;
    let comparator =
        HistogramComparator::new(config.norm_mode, config.chi2_mode, config.min_multiplicity);
    let scanner = GridScanner::new(&table, reference, comparator, config.seed);

    let results = scanner.scan(config)?;
    let refit = refit_best(&scanner, &results, config)?;
    info!(best = %refit.key, chi2_ndf = refit.reduced_chi2(), "best fit");
    let bounds = scan_bounds(&refit.simulated);
    let reweight = scan_reweight(&refit.ratio, config.reweight_bound);

    let mut hists = vec![&refit.reference, &refit.simulated, &refit.ratio];
    if config.keep_histograms {
        hists.extend(results.iter().filter_map(|r| r.simulated.as_ref()));
    }
    let summary = RunSummary::for_scan(config, &results, &refit, bounds.clone(), reweight.clone());
    write_outputs(output, &histogram_document(hists)?, &summary)?;

    Ok(ScanOutput {
        results,
        refit,
        bounds,
        reweight,
    })
}

/// Fit one explicit parameter point and write its outputs.
pub fn run_fit(inputs: &InputSources, config: &FitConfig, output: &OutputTarget) -> Result<FitOutput> {
    config.params.validate()?;
    let (table, reference) = load_inputs(inputs)?;
    let comparator =
        HistogramComparator::new(config.norm_mode, config.chi2_mode, config.min_multiplicity);
    let scanner = GridScanner::new(&table, reference, comparator, config.seed);

    let refit = refit_point(&scanner, &config.params, config.events)?;
    info!(key = %refit.key, chi2_ndf = refit.reduced_chi2(), "finished fitting");
    let bounds = scan_bounds(&refit.simulated);
    let reweight = scan_reweight(&refit.ratio, config.reweight_bound);

    let summary = RunSummary::for_fit(&refit, config.events, bounds.clone(), reweight.clone());
    let hists = histogram_document([&refit.reference, &refit.simulated, &refit.ratio])?;
    write_outputs(output, &hists, &summary)?;

    Ok(FitOutput {
        refit,
        bounds,
        reweight,
    })
}

fn write_outputs(output: &OutputTarget, histograms: &str, summary: &RunSummary) -> Result<()> {
    let summary = summary.to_json()?;
    output.prepare()?;
    let hist_path = output.histogram_path();
    fs::write(&hist_path, histograms).map_err(|e| CalibError::file(&hist_path, e))?;
    let summary_path = output.summary_path();
    fs::write(&summary_path, summary).map_err(|e| CalibError::file(&summary_path, e))?;
    Ok(())
}

fn slot(bounds: &mut BoundsSummary, xsec: XSecMod) -> &mut Option<Vec<u32>> {
    match xsec {
        XSecMod::Nominal => &mut bounds.nominal,
        XSecMod::Plus5 => &mut bounds.plus5,
        XSecMod::Minus5 => &mut bounds.minus5,
    }
}

const ALL_XSEC: [XSecMod; 3] = [XSecMod::Nominal, XSecMod::Plus5, XSecMod::Minus5];

/// Bounds for every cross-section; a failing variant is logged and left empty.
pub fn scan_bounds(hist: &Histogram1D) -> BoundsSummary {
    let mut bounds = BoundsSummary::default();
    for xsec in ALL_XSEC {
        match centrality_bounds(hist, xsec) {
            Ok(b) => *slot(&mut bounds, xsec) = Some(b),
            Err(e) => warn!(?xsec, "no centrality bounds: {e}"),
        }
    }
    bounds
}

/// Reweight fit of the final ratio; a failed fit is logged and skipped.
pub fn scan_reweight(ratio: &Histogram1D, bound: f64) -> Option<ReweightFit> {
    let config = WeightFitConfig {
        bound,
        ..WeightFitConfig::default()
    };
    match fit_reweight(ratio, &config) {
        Ok(fit) => Some(fit),
        Err(e) => {
            warn!("no reweight parameters: {e}");
            None
        }
    }
}

/// Derive bounds from a stored histogram; any failure aborts.
pub fn run_bounds(
    input_file: &Path,
    hist_name: &str,
    xsec: Option<XSecMod>,
    output: Option<&Path>,
) -> Result<BoundsSummary> {
    let hist = read_histogram(input_file, hist_name)?;
    let mods: Vec<XSecMod> = match xsec {
        Some(x) => vec![x],
        None => ALL_XSEC.to_vec(),
    };

    let mut bounds = BoundsSummary::default();
    for xsec in mods {
        *slot(&mut bounds, xsec) = Some(centrality_bounds(&hist, xsec)?);
    }
    if let Some(path) = output {
        write_bounds_json(path, &bounds)?;
    }
    Ok(bounds)
}

/// Correct every event of a CSV file in order and write the results.
///
/// Dithering draws come from one stream seeded with `config.seed`, so a
/// rerun reproduces the output exactly.
pub fn run_correct(config: &CorrectConfig) -> Result<Vec<EventCorrectionResult>> {
    let params = read_correction_parameters(&config.params_file)?;
    let corrector = if config.permissive {
        EventCorrector::new_permissive(params)?
    } else {
        EventCorrector::new(params)?
    };
    let events = read_events(&config.events_file)?;
    info!(events = events.len(), configured = corrector.is_configured(), "correcting events");

    let mut rng = RandomSource::from_seed(config.seed);
    let results: Vec<EventCorrectionResult> = events
        .iter()
        .map(|e| corrector.correct(e.runid, e.refmult, e.zdc, e.vz, &mut rng))
        .collect();
    write_corrected(&config.output_file, &results)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::{DetectorResponse, ParameterKey, ScanAxis};
    use crate::fit::Stream;
    use crate::io::{ObjectFile, StoredObject, StoredTable, read_object_file};

    fn write_histograms(path: &Path, hists: &[&Histogram1D]) {
        fs::write(path, histogram_document(hists.iter().copied()).unwrap()).unwrap();
    }
    use crate::math::TableAxis;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("centrality-calib-{}-{tag}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn response() -> DetectorResponse {
        DetectorResponse {
            constant_efficiency: true,
            ..DetectorResponse::default()
        }
    }

    /// Write a toy Glauber table and a reference generated at `truth`.
    fn write_inputs(dir: &Path, truth: ParameterKey) -> InputSources {
        let npart = TableAxis { bins: 4, min: 20.0, max: 40.0 };
        let ncoll = TableAxis { bins: 4, min: 20.0, max: 60.0 };
        let mass = vec![1.0, 2.0, 1.0, 0.5, 1.0, 2.0, 2.0, 1.0, 0.5, 1.0, 2.0, 1.0, 0.2, 0.5, 1.0, 2.0];
        let table = ParticipantCollisionTable::new(npart, ncoll, &mass).unwrap();

        let scanner = GridScanner::new(
            &table,
            Histogram1D::new("refmult", 150, 0.0, 150.0).unwrap(),
            HistogramComparator::new(NormMode::Disabled, Chi2Mode::Domain, 0.0),
            1234,
        );
        let mut reference = scanner
            .simulate(&ModelParameters::at(truth, response()), 60_000, Stream::Refit)
            .unwrap();
        reference.set_name("refmult");

        let glauber_file = dir.join("glauber.json");
        let mut objects = ObjectFile::new();
        objects.insert(
            "npartncoll".to_string(),
            StoredObject::Hist2d(StoredTable {
                npart,
                ncoll,
                contents: mass,
            }),
        );
        fs::write(&glauber_file, serde_json::to_string(&objects).unwrap()).unwrap();

        let data_file = dir.join("refmult.json");
        write_histograms(&data_file, &[&reference]);

        InputSources {
            glauber_file,
            glauber_name: "npartncoll".to_string(),
            data_file,
            data_name: "refmult".to_string(),
        }
    }

    #[test]
    fn scan_writes_histograms_and_summary() {
        let dir = temp_dir("scan");
        let inputs = write_inputs(&dir, ParameterKey::new(1.5, 2.0, 0.1));
        let config = ScanConfig {
            npp: ScanAxis { min: 1.0, max: 2.0, steps: 3 },
            k: ScanAxis { min: 2.0, max: 2.0, steps: 1 },
            x: ScanAxis { min: 0.1, max: 0.1, steps: 1 },
            response: response(),
            events: 20_000,
            refit_events: 40_000,
            min_multiplicity: 10.0,
            keep_histograms: true,
            ..ScanConfig::default()
        };
        let output = OutputTarget {
            dir: dir.join("out"),
            stem: "fit_results".to_string(),
        };

        let run = run_scan(&inputs, &config, &output).unwrap();
        assert_eq!(run.refit.key, ParameterKey::new(1.5, 2.0, 0.1));

        let objects = read_object_file(&output.histogram_path()).unwrap();
        for name in ["refmult", "glauber", "ratio", "npp_1_k_2_x_0.1", "npp_1.5_k_2_x_0.1"] {
            assert!(objects.contains_key(name), "missing {name}");
        }
        let glauber = read_histogram(&output.histogram_path(), "glauber").unwrap();
        assert_eq!(glauber.title(), "npp_1.5_k_2_x_0.1");

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output.summary_path()).unwrap()).unwrap();
        assert_eq!(summary["best"]["key"], "npp_1.5_k_2_x_0.1");
        assert_eq!(summary["points"].as_array().unwrap().len(), 3);

        let reweight = run.reweight.expect("ratio has enough bins to fit");
        assert_eq!(reweight.bound, 400.0);
        assert_eq!(reweight.parameters[2], 1.0);
        assert!(reweight.parameters.iter().all(|p| p.is_finite()));
        assert_eq!(summary["reweight"]["parameters"].as_array().unwrap().len(), 7);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_refit_leaves_no_outputs() {
        let dir = temp_dir("refit");
        let inputs = write_inputs(&dir, ParameterKey::new(1.5, 2.0, 0.1));
        let config = ScanConfig {
            npp: ScanAxis { min: 1.5, max: 1.5, steps: 1 },
            k: ScanAxis { min: 2.0, max: 2.0, steps: 1 },
            x: ScanAxis { min: 0.1, max: 0.1, steps: 1 },
            response: response(),
            events: 5_000,
            refit_events: 0,
            min_multiplicity: 10.0,
            ..ScanConfig::default()
        };
        let output = OutputTarget {
            dir: dir.join("out"),
            stem: "fit_results".to_string(),
        };

        let err = run_scan(&inputs, &config, &output).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!output.histogram_path().exists());
        assert!(!output.summary_path().exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_table_aborts_before_writing() {
        let dir = temp_dir("missing");
        let inputs = InputSources {
            glauber_file: dir.join("nope.json"),
            glauber_name: "npartncoll".to_string(),
            data_file: dir.join("nope.json"),
            data_name: "refmult".to_string(),
        };
        let output = OutputTarget {
            dir: dir.join("out"),
            stem: "fit_results".to_string(),
        };
        let err = run_scan(&inputs, &ScanConfig::default(), &output).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!output.histogram_path().exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bounds_of_a_flat_histogram() {
        let dir = temp_dir("bounds");
        let mut flat = Histogram1D::new("glauber", 150, 0.0, 150.0).unwrap();
        for m in 0..=100 {
            flat.fill_weighted(m as f64, 10.0);
        }
        let path = dir.join("glauber.json");
        write_histograms(&path, &[&flat]);

        let out = dir.join("bounds.json");
        let bounds = run_bounds(&path, "glauber", Some(XSecMod::Nominal), Some(&out)).unwrap();
        let nominal = bounds.nominal.unwrap();
        assert_eq!(nominal.first(), Some(&20));
        assert_eq!(nominal.last(), Some(&95));
        assert!(bounds.plus5.is_none());
        assert!(out.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn correct_processes_a_csv_stream() {
        let dir = temp_dir("correct");
        let params_file = dir.join("params.json");
        fs::write(
            &params_file,
            r#"{
                "zdc_linear": [1.0, 0.0],
                "vz_polynomial": [1.0, 0, 0, 0, 0, 0, 0],
                "centrality_bounds": [10, 15, 21, 29, 39, 51, 65, 82, 102, 125, 152, 184, 221, 263, 312, 370]
            }"#,
        )
        .unwrap();
        let events_file = dir.join("events.csv");
        fs::write(
            &events_file,
            "runid,refmult,zdc,vz\n1,400,5000,0\n1,50,5000,0\n1,-1,5000,0\n1,300,5000,45\n",
        )
        .unwrap();
        let config = CorrectConfig {
            params_file,
            events_file,
            output_file: dir.join("out.csv"),
            seed: 1,
            permissive: false,
        };

        let results = run_correct(&config).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].centrality16, 0);
        assert_eq!(results[0].weight, 1.0);
        assert_eq!(results[1].centrality16, 11);
        assert_eq!(results[2], EventCorrectionResult::rejected(-1.0));
        assert_eq!(results[3], EventCorrectionResult::rejected(300.0));

        let written = fs::read_to_string(&config.output_file).unwrap();
        assert_eq!(written.lines().count(), 5);
        assert!(written.starts_with("refmultcorr,cent16,cent9,weight"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn strict_correction_requires_parameters() {
        let dir = temp_dir("strict");
        let params_file = dir.join("params.json");
        fs::write(&params_file, "{}").unwrap();
        let events_file = dir.join("events.csv");
        fs::write(&events_file, "refmult,zdc,vz\n100,5000,0\n").unwrap();
        let mut config = CorrectConfig {
            params_file,
            events_file,
            output_file: dir.join("out.csv"),
            seed: 1,
            permissive: false,
        };
        assert_eq!(run_correct(&config).unwrap_err().exit_code(), 4);

        config.permissive = true;
        let results = run_correct(&config).unwrap();
        assert_eq!(results, vec![EventCorrectionResult::unconfigured()]);
        fs::remove_dir_all(&dir).ok();
    }
}
