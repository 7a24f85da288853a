//! Normalization and χ² comparison of a simulated histogram against the
//! reference multiplicity distribution.
//!
//! Only bins at or above the minimum multiplicity take part: the low
//! multiplicity region is dominated by trigger inefficiency the model does
//! not describe.

use tracing::warn;

use crate::domain::{Chi2Mode, NormMode};
use crate::error::{CalibError, Result};
use crate::math::Histogram1D;

/// χ² with its number of degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chi2 {
    pub chi2: f64,
    pub ndf: u32,
}

impl Chi2 {
    /// `chi2 / ndf`, or `+∞` when no bins contributed.
    pub fn reduced(&self) -> f64 {
        if self.ndf == 0 {
            f64::INFINITY
        } else {
            self.chi2 / self.ndf as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramComparator {
    pub norm_mode: NormMode,
    pub chi2_mode: Chi2Mode,
    pub min_multiplicity: f64,
}

impl HistogramComparator {
    pub fn new(norm_mode: NormMode, chi2_mode: Chi2Mode, min_multiplicity: f64) -> Self {
        Self {
            norm_mode,
            chi2_mode,
            min_multiplicity,
        }
    }

    /// Factor that scales `simulated` onto `reference`.
    ///
    /// A non-positive simulated integral cannot be normalized; the factor
    /// falls back to `1.0`.
    pub fn normalize(&self, simulated: &Histogram1D, reference: &Histogram1D) -> f64 {
        let (num, den) = match self.norm_mode {
            NormMode::Disabled => return 1.0,
            NormMode::Integral => (reference.integral(), simulated.integral()),
            NormMode::Region => {
                let r0 = reference.first_bin_from(self.min_multiplicity);
                let s0 = simulated.first_bin_from(self.min_multiplicity);
                (
                    reference.integral_range(r0, reference.n_bins()),
                    simulated.integral_range(s0, simulated.n_bins()),
                )
            }
        };
        if !(den > 0.0) || !num.is_finite() {
            warn!(
                simulated = simulated.name(),
                numerator = num,
                denominator = den,
                "cannot normalize simulated histogram, using factor 1"
            );
            return 1.0;
        }
        num / den
    }

    /// χ² between histograms that are already on a common scale.
    pub fn chi2(&self, simulated: &Histogram1D, reference: &Histogram1D) -> Result<Chi2> {
        if !simulated.same_binning(reference) {
            return Err(CalibError::MalformedInput(format!(
                "simulated '{}' ({} bins, [{}, {})) and reference '{}' ({} bins, [{}, {})) differ in binning",
                simulated.name(),
                simulated.n_bins(),
                simulated.x_min(),
                simulated.x_max(),
                reference.name(),
                reference.n_bins(),
                reference.x_min(),
                reference.x_max(),
            )));
        }
        Ok(match self.chi2_mode {
            Chi2Mode::Generic => self.chi2_generic(simulated, reference),
            Chi2Mode::Domain => self.chi2_domain(simulated, reference),
        })
    }

    /// Scale `simulated` onto `reference` in place and return the χ².
    pub fn compare(&self, simulated: &mut Histogram1D, reference: &Histogram1D) -> Result<Chi2> {
        let factor = self.normalize(simulated, reference);
        simulated.scale(factor);
        self.chi2(simulated, reference)
    }

    fn included_bins<'a>(&self, reference: &'a Histogram1D) -> impl Iterator<Item = usize> + 'a {
        let first = reference.first_bin_from(self.min_multiplicity + 0.001);
        (first..reference.n_bins())
            .filter(move |&bin| reference.content(bin) > 0.0 && reference.error(bin) > 0.0)
    }

    fn chi2_domain(&self, simulated: &Histogram1D, reference: &Histogram1D) -> Chi2 {
        let mut chi2 = 0.0;
        let mut ndf = 0;
        for bin in self.included_bins(reference) {
            let pull = (reference.content(bin) - simulated.content(bin)) / reference.error(bin);
            chi2 += pull * pull;
            ndf += 1;
        }
        Chi2 { chi2, ndf }
    }

    /// Shape comparison: both histograms are normalized to unit sum over the
    /// included bins and the difference is weighted by the combined errors.
    fn chi2_generic(&self, simulated: &Histogram1D, reference: &Histogram1D) -> Chi2 {
        let bins: Vec<usize> = self.included_bins(reference).collect();
        let sum_ref: f64 = bins.iter().map(|&b| reference.content(b)).sum();
        let sum_sim: f64 = bins.iter().map(|&b| simulated.content(b)).sum();
        if !(sum_ref > 0.0 && sum_sim > 0.0) {
            return Chi2 { chi2: 0.0, ndf: 0 };
        }

        let mut chi2 = 0.0;
        let mut included = 0_u32;
        for bin in bins {
            let (r, s) = (reference.content(bin), simulated.content(bin));
            let (er, es) = (reference.error(bin), simulated.error(bin));
            let diff = r / sum_ref - s / sum_sim;
            let var = er * er / (sum_ref * sum_ref) + es * es / (sum_sim * sum_sim);
            chi2 += diff * diff / var;
            included += 1;
        }
        Chi2 {
            chi2,
            ndf: included.saturating_sub(1),
        }
    }
}
