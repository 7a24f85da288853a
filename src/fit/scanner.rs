//! Grid scan over the multiplicity model parameters.
//!
//! For each lattice point we:
//! - build the multiplicity model
//! - simulate `events` collisions from the Glauber table into a histogram
//!   binned like the reference
//! - normalize and compare with the configured χ² definition
//!
//! Points run in parallel. Each point draws from its own random stream
//! derived from the run seed and the point's key, so the result set is
//! identical for any number of worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{ModelParameters, ParameterKey, ScanConfig};
use crate::error::{CalibError, Result};
use crate::fit::compare::{Chi2, HistogramComparator};
use crate::fit::lattice::parameter_lattice;
use crate::fit::selection::ScanResultSet;
use crate::math::{Histogram1D, ParticipantCollisionTable};
use crate::models::MultiplicityModel;
use crate::random::RandomSource;

/// Progress is logged every this many completed points.
const PROGRESS_EVERY: usize = 10;

/// Outcome of fitting one parameter point.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub key: ParameterKey,
    pub chi2: f64,
    pub ndf: u32,
    /// Normalized simulated histogram; dropped for non-best points unless
    /// histograms are kept.
    pub simulated: Option<Histogram1D>,
    /// Shared snapshot of the reference distribution.
    pub reference: Arc<Histogram1D>,
}

impl FitResult {
    pub fn reduced_chi2(&self) -> f64 {
        Chi2 {
            chi2: self.chi2,
            ndf: self.ndf,
        }
        .reduced()
    }

    /// `<key>_chi2/ndf=<value>` as used for stored histogram titles.
    pub fn label(&self) -> String {
        format!("{}_chi2/ndf={:.5}", self.key, self.reduced_chi2())
    }
}

/// Which random stream a simulation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Scan,
    Refit,
}

pub struct GridScanner<'a> {
    table: &'a ParticipantCollisionTable,
    reference: Arc<Histogram1D>,
    comparator: HistogramComparator,
    seed: u64,
}

impl<'a> GridScanner<'a> {
    pub fn new(
        table: &'a ParticipantCollisionTable,
        reference: Histogram1D,
        comparator: HistogramComparator,
        seed: u64,
    ) -> Self {
        Self {
            table,
            reference: Arc::new(reference),
            comparator,
            seed,
        }
    }

    pub fn reference(&self) -> &Histogram1D {
        &self.reference
    }

    /// Simulate `events` collisions into a histogram binned like the reference.
    pub fn simulate(
        &self,
        params: &ModelParameters,
        events: u64,
        stream: Stream,
    ) -> Result<Histogram1D> {
        let model = MultiplicityModel::new(*params)?;
        let key = params.key();
        let mut rng = RandomSource::for_stream(self.seed, &(key, stream));

        let mut hist = self.reference.empty_like(key.to_string());
        for _ in 0..events {
            if let Some(mult) = model.sample_event(self.table, &mut rng) {
                hist.fill(mult as f64);
            }
        }
        Ok(hist)
    }

    /// Simulate, normalize and compare one parameter point.
    pub fn fit_point(
        &self,
        params: &ModelParameters,
        events: u64,
        stream: Stream,
    ) -> Result<FitResult> {
        let mut simulated = self.simulate(params, events, stream)?;
        let Chi2 { chi2, ndf } = self.comparator.compare(&mut simulated, &self.reference)?;
        let mut result = FitResult {
            key: params.key(),
            chi2,
            ndf,
            simulated: None,
            reference: Arc::clone(&self.reference),
        };
        simulated.set_title(result.label());
        result.simulated = Some(simulated);
        Ok(result)
    }

    /// Fit every lattice point of `config`.
    ///
    /// The best point always carries its simulated histogram; when
    /// `keep_histograms` is off it is regenerated from its own stream after
    /// the scan, which reproduces it exactly.
    pub fn scan(&self, config: &ScanConfig) -> Result<ScanResultSet> {
        if config.events == 0 {
            return Err(CalibError::InvalidConfig("events per point must be >= 1.".to_string()));
        }
        config.response.validate()?;
        let lattice = parameter_lattice(config.npp, config.k, config.x)?;
        let total = lattice.len();
        info!(points = total, events = config.events, "starting grid scan");

        let done = AtomicUsize::new(0);
        let entries = lattice
            .par_iter()
            .map(|&key| {
                let params = ModelParameters::at(key, config.response);
                let mut result = self.fit_point(&params, config.events, Stream::Scan)?;
                if !config.keep_histograms {
                    result.simulated = None;
                }

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_EVERY == 0 || n == total {
                    info!(
                        "scan {:.2}% complete: npp={} k={} x={} chi2/ndf={:.5}",
                        n as f64 / total as f64 * 100.0,
                        key.npp,
                        key.k,
                        key.x,
                        result.reduced_chi2()
                    );
                } else {
                    debug!(%key, chi2 = result.chi2, ndf = result.ndf, "point done");
                }
                Ok(result)
            })
            .collect::<Result<Vec<FitResult>>>()?;

        let mut results = ScanResultSet::from_entries(entries);
        if !config.keep_histograms {
            if let Some(best_key) = results.best().map(|b| b.key) {
                let params = ModelParameters::at(best_key, config.response);
                let regenerated = self.fit_point(&params, config.events, Stream::Scan)?;
                results.set_histogram(&best_key, regenerated.simulated);
            }
        }
        Ok(results)
    }
}
