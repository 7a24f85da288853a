//! Reweighting parameters from the simulated/reference ratio.
//!
//! The ratio is fitted on bins below `bound` with
//!
//! ```text
//! w(m) = p0 + p1/u + p4·u + p5/u² + p6·u²,   u = p2·m + p3
//! ```
//!
//! Rescaling `u` only rescales the linear coefficients, so `p2` is pinned to
//! 1 and the shift `p3` is found by a grid search that is refined around the
//! best point. At every shift the five linear coefficients come from a
//! weighted least-squares solve, weighted by the ratio errors.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::corrector::REWEIGHT_PARAMS;
use crate::domain::ScanAxis;
use crate::error::{CalibError, Result};
use crate::fit::lin_space;
use crate::math::{Histogram1D, weighted_least_squares};

/// Shift search for the reweight fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightFitConfig {
    /// Bins with a center at or above this multiplicity are not fitted.
    pub bound: f64,
    /// Initial `p3` grid; `min` must be positive so that `u > 0`.
    pub shift: ScanAxis,
    /// Number of times the grid is rebuilt around the best shift.
    pub refinements: usize,
}

impl Default for WeightFitConfig {
    fn default() -> Self {
        Self {
            bound: 400.0,
            shift: ScanAxis { min: 0.5, max: 100.0, steps: 200 },
            refinements: 4,
        }
    }
}

/// Fitted reweight parameters in the order the corrector consumes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReweightFit {
    pub bound: f64,
    pub parameters: [f64; REWEIGHT_PARAMS],
    pub chi2: f64,
    pub ndf: u32,
}

struct RatioPoint {
    m: f64,
    value: f64,
    weight: f64,
}

struct Candidate {
    shift: f64,
    linear: [f64; 5],
    chi2: f64,
}

/// Fit the reweighting function to `ratio` over `[0, config.bound)`.
///
/// Empty bins and bins without an error are skipped.
pub fn fit_reweight(ratio: &Histogram1D, config: &WeightFitConfig) -> Result<ReweightFit> {
    if !(config.bound.is_finite() && config.bound > 0.0) {
        return Err(CalibError::InvalidConfig(format!(
            "reweight bound must be positive, got {}",
            config.bound
        )));
    }
    if !(config.shift.min > 0.0) {
        return Err(CalibError::InvalidConfig(format!(
            "reweight shift grid must start above 0, got {}",
            config.shift.min
        )));
    }

    let points: Vec<RatioPoint> = (0..ratio.n_bins())
        .filter_map(|bin| {
            let m = ratio.bin_center(bin);
            let value = ratio.content(bin);
            let error = ratio.error(bin);
            (m >= 0.0 && m < config.bound && value != 0.0 && error > 0.0).then(|| RatioPoint {
                m,
                value,
                weight: 1.0 / (error * error),
            })
        })
        .collect();
    if points.len() <= REWEIGHT_PARAMS - 1 {
        return Err(CalibError::Numerical(format!(
            "only {} ratio bins below {} to fit {} reweight parameters",
            points.len(),
            config.bound,
            REWEIGHT_PARAMS - 1
        )));
    }

    let mut axis = config.shift;
    let mut best = best_shift(&points, &lin_space("reweight shift", axis)?)?;
    for _ in 0..config.refinements {
        if axis.steps < 2 {
            break;
        }
        let step = (axis.max - axis.min) / (axis.steps as f64 - 1.0);
        axis = ScanAxis {
            min: (best.shift - step).max(config.shift.min),
            max: best.shift + step,
            steps: axis.steps,
        };
        let refined = best_shift(&points, &lin_space("reweight shift", axis)?)?;
        if refined.chi2 <= best.chi2 {
            best = refined;
        }
        debug!(shift = best.shift, chi2 = best.chi2, "refined reweight shift");
    }

    let [p0, p1, p4, p5, p6] = best.linear;
    let fit = ReweightFit {
        bound: config.bound,
        parameters: [p0, p1, 1.0, best.shift, p4, p5, p6],
        chi2: best.chi2,
        ndf: (points.len() - (REWEIGHT_PARAMS - 1)) as u32,
    };
    info!(chi2 = fit.chi2, ndf = fit.ndf, "fitted reweight parameters");
    Ok(fit)
}

/// Lowest-χ² shift of the grid; ties keep the smaller shift.
fn best_shift(points: &[RatioPoint], shifts: &[f64]) -> Result<Candidate> {
    let candidates: Vec<Option<Candidate>> =
        shifts.par_iter().map(|&s| solve_at_shift(points, s)).collect();

    let mut best: Option<Candidate> = None;
    for c in candidates.into_iter().flatten() {
        match &best {
            Some(b) if c.chi2 >= b.chi2 => {}
            _ => best = Some(c),
        }
    }
    best.ok_or_else(|| CalibError::Numerical("reweight fit did not converge".to_string()))
}

fn solve_at_shift(points: &[RatioPoint], shift: f64) -> Option<Candidate> {
    let n = points.len();
    let mut x = DMatrix::<f64>::zeros(n, 5);
    for (i, p) in points.iter().enumerate() {
        let u = p.m + shift;
        x[(i, 0)] = 1.0;
        x[(i, 1)] = 1.0 / u;
        x[(i, 2)] = u;
        x[(i, 3)] = 1.0 / (u * u);
        x[(i, 4)] = u * u;
    }
    let y = DVector::from_iterator(n, points.iter().map(|p| p.value));
    let w = DVector::from_iterator(n, points.iter().map(|p| p.weight));

    let fit = weighted_least_squares(&x, &y, &w)?;
    fit.chi2.is_finite().then(|| Candidate {
        shift,
        linear: [fit.beta[0], fit.beta[1], fit.beta[2], fit.beta[3], fit.beta[4]],
        chi2: fit.chi2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::math::reweight;

    const TRUTH: [f64; 7] = [1.5, -20.0, 1.0, 6.0, 1e-3, 600.0, 5e-6];

    fn synthetic_ratio(bins: usize) -> Histogram1D {
        let contents: Vec<f64> = (0..bins).map(|b| reweight(&TRUTH, b as f64 + 0.5)).collect();
        let errors = contents.iter().map(|c| 0.01 * c.abs()).collect();
        Histogram1D::from_contents("ratio", 0.0, bins as f64, contents, Some(errors)).unwrap()
    }

    #[test]
    fn recovers_known_parameters() {
        let ratio = synthetic_ratio(500);
        let fit = fit_reweight(&ratio, &WeightFitConfig::default()).unwrap();
        let p = fit.parameters;

        assert_eq!(p[2], 1.0);
        assert!((p[3] - TRUTH[3]).abs() < 1e-3, "shift {}", p[3]);
        for i in [0, 1, 4, 5, 6] {
            let rel = (p[i] - TRUTH[i]).abs() / TRUTH[i].abs();
            assert!(rel < 1e-2, "p{i} = {} vs {}", p[i], TRUTH[i]);
        }
        assert!(fit.chi2 < 1e-6, "chi2 {}", fit.chi2);
        // 400 bins below the bound minus 6 free parameters
        assert_eq!(fit.ndf, 394);
        for m in [1.0, 50.0, 250.0, 399.0] {
            let rel = (reweight(&p, m) - reweight(&TRUTH, m)).abs() / reweight(&TRUTH, m);
            assert!(rel < 1e-5, "w({m}) off by {rel}");
        }
    }

    #[test]
    fn bins_above_the_bound_are_ignored() {
        let mut contents: Vec<f64> = (0..300).map(|b| reweight(&TRUTH, b as f64 + 0.5)).collect();
        for c in contents.iter_mut().skip(200) {
            *c = 1e6;
        }
        let ratio = Histogram1D::from_contents("ratio", 0.0, 300.0, contents, None).unwrap();
        let config = WeightFitConfig {
            bound: 200.0,
            ..WeightFitConfig::default()
        };
        let fit = fit_reweight(&ratio, &config).unwrap();
        assert_eq!(fit.bound, 200.0);
        assert!((reweight(&fit.parameters, 100.0) - reweight(&TRUTH, 100.0)).abs() < 1e-3);
    }

    #[test]
    fn too_few_bins_is_an_error() {
        let ratio = synthetic_ratio(500);
        let config = WeightFitConfig {
            bound: 5.0,
            ..WeightFitConfig::default()
        };
        assert!(matches!(fit_reweight(&ratio, &config), Err(CalibError::Numerical(_))));

        let bad = WeightFitConfig {
            bound: -1.0,
            ..WeightFitConfig::default()
        };
        assert!(matches!(fit_reweight(&ratio, &bad), Err(CalibError::InvalidConfig(_))));
    }
}
