//! Reporting utilities: rankings and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting and correction code stays free of presentation details
//! - output changes are localized

use crate::centrality::ReweightFit;
use crate::domain::{EventCorrectionResult, ScanConfig};
use crate::fit::{FinalComparison, FitResult, ScanResultSet};
use crate::io::BoundsSummary;

/// The `top_n` lattice points with the lowest χ²/ndf (ties keep lattice order).
pub fn rank_points(results: &ScanResultSet, top_n: usize) -> Vec<&FitResult> {
    let mut sorted: Vec<&FitResult> = results.iter().collect();
    let score = |r: &FitResult| {
        let v = r.reduced_chi2();
        if v.is_nan() { f64::INFINITY } else { v }
    };
    sorted.sort_by(|a, b| score(a).total_cmp(&score(b)));
    sorted.truncate(top_n);
    sorted
}

/// Format the full scan summary (configuration, ranking, refit, bounds, weights).
pub fn format_scan_summary(
    config: &ScanConfig,
    results: &ScanResultSet,
    refit: &FinalComparison,
    bounds: &BoundsSummary,
    reweight: Option<&ReweightFit>,
    top_n: usize,
) -> String {
    let mut out = String::new();

    out.push_str("=== centrality - Glauber + NBD grid scan ===\n");
    out.push_str(&format!(
        "Lattice: npp=[{}, {}]x{} | k=[{}, {}]x{} | x=[{}, {}]x{} ({} points)\n",
        config.npp.min,
        config.npp.max,
        config.npp.steps,
        config.k.min,
        config.k.max,
        config.k.steps,
        config.x.min,
        config.x.max,
        config.x.steps,
        results.len(),
    ));
    out.push_str(&format!(
        "Events/point: {} | chi2: {:?} | norm: {:?} | min mult: {} | seed: {}\n",
        config.events, config.chi2_mode, config.norm_mode, config.min_multiplicity, config.seed
    ));
    out.push_str(&format!(
        "Efficiency: pp={} AA={} @ {} | trigger bias={} | constant={}\n",
        config.response.pp_efficiency,
        config.response.aa_efficiency,
        config.response.central_multiplicity,
        config.response.trigger_bias,
        config.response.constant_efficiency,
    ));

    out.push_str(&format!("\nTop {top_n} points:\n"));
    let best_key = results.best().map(|b| b.key);
    for r in rank_points(results, top_n) {
        let chosen = if Some(r.key) == best_key { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} npp={:<8.4} k={:<8.4} x={:<8.4} chi2={:<12.3} ndf={:<5} chi2/ndf={:.5}\n",
            r.key.npp,
            r.key.k,
            r.key.x,
            r.chi2,
            r.ndf,
            r.reduced_chi2()
        ));
    }

    out.push_str(&format_refit(refit, config.refit_events));
    out.push_str(&format_bounds(bounds));
    out.push_str(&format_reweight(reweight));
    out
}

/// Format a single-point fit.
pub fn format_fit_summary(
    refit: &FinalComparison,
    events: u64,
    bounds: &BoundsSummary,
    reweight: Option<&ReweightFit>,
) -> String {
    let mut out = String::new();
    out.push_str("=== centrality - Glauber + NBD fit ===\n");
    out.push_str(&format_refit(refit, events));
    out.push_str(&format_bounds(bounds));
    out.push_str(&format_reweight(reweight));
    out
}

fn format_refit(refit: &FinalComparison, events: u64) -> String {
    format!(
        "\nBest fit: {}\nRefit ({events} events): chi2={:.3} ndf={} chi2/ndf={:.5}\n",
        refit.key,
        refit.chi2,
        refit.ndf,
        refit.reduced_chi2()
    )
}

/// Format centrality thresholds, most central class first.
pub fn format_bounds(bounds: &BoundsSummary) -> String {
    let mut out = String::from("\nCentrality bounds (0-5% ... 75-80%):\n");
    for (label, b) in [
        ("nominal", &bounds.nominal),
        ("+5% xsec", &bounds.plus5),
        ("-5% xsec", &bounds.minus5),
    ] {
        let line = match b {
            Some(b) => b
                .iter()
                .rev()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            None => "unavailable".to_string(),
        };
        out.push_str(&format!("  {label:<9} {line}\n"));
    }
    out
}

fn format_reweight(reweight: Option<&ReweightFit>) -> String {
    let Some(fit) = reweight else {
        return "\nReweight parameters: unavailable\n".to_string();
    };
    let params = fit
        .parameters
        .iter()
        .map(|p| format!("{p:.6e}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "\nReweight parameters (m < {}, chi2/ndf={:.3}/{}):\n  [{params}]\n",
        fit.bound, fit.chi2, fit.ndf
    )
}

/// Per-class event counts of a corrected batch.
pub fn format_correction_summary(results: &[EventCorrectionResult]) -> String {
    let rejected = results.iter().filter(|r| r.weight == 0.0).count();
    let mut per_class = [0_usize; 16];
    let mut unassigned = 0;
    for r in results.iter().filter(|r| r.weight != 0.0) {
        match usize::try_from(r.centrality16) {
            Ok(c) if c < per_class.len() => per_class[c] += 1,
            _ => unassigned += 1,
        }
    }

    let mut out = String::new();
    out.push_str("=== centrality - event correction ===\n");
    out.push_str(&format!(
        "Events: {} | zero weight: {rejected} | below 80%: {unassigned}\n",
        results.len()
    ));
    for (i, n) in per_class.iter().enumerate() {
        out.push_str(&format!("  {:>2}-{:<3}% {n}\n", i * 5, (i + 1) * 5));
    }
    out
}
