//! Export scan and fit results to JSON.
//!
//! The summary is meant to be easy to consume from scripts: the best point,
//! the high-statistics refit, centrality bounds, reweight parameters and (for
//! scans) the full χ² table in lattice order.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::centrality::ReweightFit;
use crate::domain::{ParameterKey, ScanConfig};
use crate::error::{CalibError, Result};
use crate::fit::{FinalComparison, FitResult, ScanResultSet};

#[derive(Debug, Clone, Serialize)]
pub struct PointSummary {
    pub key: String,
    pub npp: f64,
    pub k: f64,
    pub x: f64,
    pub chi2: f64,
    pub ndf: u32,
    /// `null` when the point has no degrees of freedom.
    pub chi2_ndf: Option<f64>,
}

impl PointSummary {
    fn new(key: ParameterKey, chi2: f64, ndf: u32) -> Self {
        let reduced = chi2 / ndf as f64;
        Self {
            key: key.to_string(),
            npp: key.npp,
            k: key.k,
            x: key.x,
            chi2,
            ndf,
            chi2_ndf: (ndf > 0 && reduced.is_finite()).then_some(reduced),
        }
    }
}

impl From<&FitResult> for PointSummary {
    fn from(r: &FitResult) -> Self {
        Self::new(r.key, r.chi2, r.ndf)
    }
}

impl From<&FinalComparison> for PointSummary {
    fn from(r: &FinalComparison) -> Self {
        Self::new(r.key, r.chi2, r.ndf)
    }
}

/// 16-class thresholds for the nominal and modified cross-sections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoundsSummary {
    pub nominal: Option<Vec<u32>>,
    pub plus5: Option<Vec<u32>>,
    pub minus5: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ScanConfig>,
    /// Best lattice point as scored during the scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<PointSummary>,
    /// High-statistics refit of the selected point.
    pub refit: PointSummary,
    pub refit_events: u64,
    pub centrality_bounds: BoundsSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<PointSummary>,
    /// Reweight parameters fitted to the final ratio, ready for the corrector.
    pub reweight: Option<ReweightFit>,
}

impl RunSummary {
    pub fn for_scan(
        config: &ScanConfig,
        results: &ScanResultSet,
        refit: &FinalComparison,
        bounds: BoundsSummary,
        reweight: Option<ReweightFit>,
    ) -> Self {
        Self {
            tool: "centrality".to_string(),
            config: Some(config.clone()),
            best: results.best().map(PointSummary::from),
            refit: PointSummary::from(refit),
            refit_events: config.refit_events,
            centrality_bounds: bounds,
            points: results.iter().map(PointSummary::from).collect(),
            reweight,
        }
    }

    pub fn for_fit(
        refit: &FinalComparison,
        events: u64,
        bounds: BoundsSummary,
        reweight: Option<ReweightFit>,
    ) -> Self {
        Self {
            tool: "centrality".to_string(),
            config: None,
            best: None,
            refit: PointSummary::from(refit),
            refit_events: events,
            centrality_bounds: bounds,
            points: Vec::new(),
            reweight,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn write_bounds_json(path: &Path, bounds: &BoundsSummary) -> Result<()> {
    let file = File::create(path).map_err(|e| CalibError::file(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), bounds)?;
    Ok(())
}
