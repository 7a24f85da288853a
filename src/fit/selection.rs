//! Best-point selection and the final high-statistics refit.
//!
//! Selection rules:
//! 1. rank points by χ²/ndf (points without degrees of freedom rank last)
//! 2. ties go to the earlier lattice point, so the choice is deterministic
//! 3. the winner is re-simulated with `refit_events` from a dedicated stream

use std::collections::HashMap;

use tracing::info;

use crate::domain::{ModelParameters, ParameterKey, ScanConfig};
use crate::error::{CalibError, Result};
use crate::fit::scanner::{FitResult, GridScanner, Stream};
use crate::math::Histogram1D;

/// Scan results in lattice order, indexed by parameter key.
#[derive(Debug, Clone, Default)]
pub struct ScanResultSet {
    entries: Vec<FitResult>,
    index: HashMap<ParameterKey, usize>,
}

impl ScanResultSet {
    pub fn from_entries(entries: Vec<FitResult>) -> Self {
        let index = entries.iter().enumerate().map(|(i, r)| (r.key, i)).collect();
        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ParameterKey) -> Option<&FitResult> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FitResult> {
        self.entries.iter()
    }

    /// Point with the smallest χ²/ndf; ties keep the earliest lattice point.
    pub fn best(&self) -> Option<&FitResult> {
        let score = |r: &FitResult| {
            let v = r.reduced_chi2();
            if v.is_nan() { f64::INFINITY } else { v }
        };
        let mut best: Option<&FitResult> = None;
        for r in &self.entries {
            match best {
                Some(b) if score(r) >= score(b) => {}
                _ => best = Some(r),
            }
        }
        best
    }

    pub(crate) fn set_histogram(&mut self, key: &ParameterKey, hist: Option<Histogram1D>) {
        if let Some(&i) = self.index.get(key) {
            self.entries[i].simulated = hist;
        }
    }
}

/// Reference, high-statistics simulation and their ratio for the best point.
#[derive(Debug, Clone)]
pub struct FinalComparison {
    pub key: ParameterKey,
    pub chi2: f64,
    pub ndf: u32,
    /// Reference distribution, stored as `refmult`.
    pub reference: Histogram1D,
    /// Normalized simulation, stored as `glauber` with the key as title.
    pub simulated: Histogram1D,
    /// `simulated / reference`; zero where the reference is empty.
    pub ratio: Histogram1D,
}

impl FinalComparison {
    pub fn reduced_chi2(&self) -> f64 {
        if self.ndf == 0 {
            f64::INFINITY
        } else {
            self.chi2 / self.ndf as f64
        }
    }
}

/// Re-simulate the best scan point with `config.refit_events` events.
pub fn refit_best(
    scanner: &GridScanner<'_>,
    results: &ScanResultSet,
    config: &ScanConfig,
) -> Result<FinalComparison> {
    let best = results
        .best()
        .ok_or_else(|| CalibError::InvalidConfig("scan produced no lattice points".to_string()))?;
    info!(
        best = %best.key,
        chi2_ndf = best.reduced_chi2(),
        events = config.refit_events,
        "refitting best point"
    );

    let params = ModelParameters::at(best.key, config.response);
    refit_point(scanner, &params, config.refit_events)
}

/// High-statistics fit of a single point, packaged for output.
pub fn refit_point(
    scanner: &GridScanner<'_>,
    params: &ModelParameters,
    events: u64,
) -> Result<FinalComparison> {
    if events == 0 {
        return Err(CalibError::InvalidConfig("refit events must be >= 1.".to_string()));
    }
    let refit = scanner.fit_point(params, events, Stream::Refit)?;
    let mut simulated = refit.simulated.ok_or_else(|| {
        CalibError::Numerical(format!("refit of {} produced no histogram", refit.key))
    })?;
    simulated.set_name("glauber");
    simulated.set_title(refit.key.to_string());

    let mut reference = scanner.reference().clone();
    reference.set_name("refmult");
    let ratio = simulated.divide(&reference, "ratio")?;

    Ok(FinalComparison {
        key: refit.key,
        chi2: refit.chi2,
        ndf: refit.ndf,
        reference,
        simulated,
        ratio,
    })
}
