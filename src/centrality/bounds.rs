//! Multiplicity thresholds of the 5%-wide centrality classes.
//!
//! The normalized multiplicity distribution is integrated from both ends.
//! Each direction assigns a class edge at the first bin whose cumulative
//! fraction passes it, and both directions must agree. Thresholds are bin
//! low edges, so the histogram should have unit-width multiplicity bins.

use tracing::error;

use crate::domain::XSecMod;
use crate::error::{CalibError, Result};
use crate::math::Histogram1D;

/// Number of 5% classes covering 0–80%.
pub const CENTRALITY16_BINS: usize = 16;

/// Upper edges (in %) of the 0–5%, 5–10%, …, 75–80% classes.
pub const CENTRALITY16_UPPER: [f64; CENTRALITY16_BINS] = [
    5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0, 80.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Lower multiplicity bound of each class, ascending (75–80% first, 0–5% last).
pub fn centrality_bounds(hist: &Histogram1D, xsec: XSecMod) -> Result<Vec<u32>> {
    let total = hist.integral();
    if !(total > 0.0) {
        return Err(CalibError::MalformedInput(format!(
            "histogram '{}' has no content to derive centrality bounds from",
            hist.name()
        )));
    }

    let forward = integrate(hist, total, Direction::Forward, xsec);
    let backward = integrate(hist, total, Direction::Backward, xsec);
    if forward != backward {
        error!(?xsec, ?forward, ?backward, "centrality bounds differ between integration directions");
        return Err(CalibError::Numerical(format!(
            "centrality bounds of '{}' differ when integrating forwards and backwards",
            hist.name()
        )));
    }
    Ok(forward)
}

fn integrate(hist: &Histogram1D, total: f64, direction: Direction, xsec: XSecMod) -> Vec<u32> {
    let scale = xsec.factor() / 100.0;
    // Forward: the most peripheral edge is met first; backward: the most central.
    let cuts: Vec<f64> = match direction {
        Direction::Forward => CENTRALITY16_UPPER.iter().rev().map(|e| e * scale).collect(),
        Direction::Backward => CENTRALITY16_UPPER.iter().map(|e| e * scale).collect(),
    };

    let n = hist.n_bins();
    let mut bounds = vec![0_u32; CENTRALITY16_BINS];
    let mut assigned = 0;
    for step in 0..n {
        let (first, last, bin) = match direction {
            Direction::Forward => (0, step + 1, step),
            Direction::Backward => (n - 1 - step, n, n - 1 - step),
        };
        let fraction = round_significant(hist.integral_range(first, last) / total, 12);
        let mult = hist.bin_low_edge(bin).floor().max(0.0) as u32;

        while assigned < CENTRALITY16_BINS {
            let passed = match direction {
                Direction::Forward => 1.0 - fraction < cuts[assigned],
                Direction::Backward => fraction >= cuts[assigned],
            };
            if !passed {
                break;
            }
            bounds[assigned] = mult;
            assigned += 1;
        }
    }

    bounds.sort_unstable();
    bounds
}

/// Round to `digits` significant decimal digits.
fn round_significant(v: f64, digits: i32) -> f64 {
    if v == 0.0 || !v.is_finite() {
        return v;
    }
    let factor = 10_f64.powi(digits - v.abs().log10().ceil() as i32);
    (v * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(n_bins: usize, filled: usize) -> Histogram1D {
        let mut contents = vec![0.0; n_bins];
        for c in contents.iter_mut().take(filled) {
            *c = 1000.0;
        }
        Histogram1D::from_contents("glauber", 0.0, n_bins as f64, contents, None).unwrap()
    }

    #[test]
    fn flat_distribution_gives_evenly_spaced_bounds() {
        let bounds = centrality_bounds(&flat(150, 101), XSecMod::Nominal).unwrap();
        let expected: Vec<u32> = (0..16).map(|i| 20 + 5 * i).collect();
        assert_eq!(bounds, expected);
    }

    #[test]
    fn cross_section_modification_shifts_bounds() {
        let h = flat(150, 101);
        let nominal = centrality_bounds(&h, XSecMod::Nominal).unwrap();
        let plus = centrality_bounds(&h, XSecMod::Plus5).unwrap();
        let minus = centrality_bounds(&h, XSecMod::Minus5).unwrap();
        // Larger cross-section: each class covers more events, edges move down.
        assert!(plus.iter().zip(&nominal).all(|(p, n)| p <= n));
        assert!(minus.iter().zip(&nominal).all(|(m, n)| m >= n));
        assert!(plus[0] < nominal[0] && minus[0] > nominal[0]);
    }

    #[test]
    fn bounds_are_ascending_for_a_falling_spectrum() {
        let contents: Vec<f64> = (0..400).map(|i| 1.0e4 * (-(i as f64) / 60.0).exp()).collect();
        let h = Histogram1D::from_contents("glauber", 0.0, 400.0, contents, None).unwrap();
        let bounds = centrality_bounds(&h, XSecMod::Nominal).unwrap();
        assert_eq!(bounds.len(), 16);
        assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn empty_histogram_is_rejected() {
        let h = Histogram1D::new("glauber", 10, 0.0, 10.0).unwrap();
        assert_eq!(centrality_bounds(&h, XSecMod::Nominal).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn round_significant_trims_noise() {
        assert_eq!(round_significant(0.1 + 0.2, 12), 0.3);
        assert_eq!(round_significant(0.0, 12), 0.0);
    }
}
