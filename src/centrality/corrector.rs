//! Per-event multiplicity correction and centrality assignment.
//!
//! An accepted event's raw multiplicity is dithered by a uniform draw,
//! corrected for vertex position and luminosity, classified against the
//! 16- and 9-class multiplicity thresholds and given a reweighting factor.
//! Rejected events come back as a sentinel so they stay visible in the
//! output stream.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::error;

use crate::domain::{Centrality9Rule, CorrectionParameters, EventCorrectionResult, RunPolicy};
use crate::error::{CalibError, Result};
use crate::math::{power_sum, reweight};
use crate::random::RandomSource;

const ZDC_PARAMS: usize = 2;
const VZ_PARAMS: usize = 7;
pub(crate) const REWEIGHT_PARAMS: usize = 7;
const CENTRALITY16_PARAMS: usize = 16;

/// Derive the coarse class thresholds from the 16 fine ones.
pub fn centrality9_bounds(bounds16: &[u32], rule: Centrality9Rule) -> Vec<u32> {
    let last = bounds16.len().saturating_sub(1);
    bounds16
        .iter()
        .enumerate()
        .filter(|&(i, _)| match rule {
            Centrality9Rule::EveryOtherPlusLast => i % 2 == 0 || i == last,
            Centrality9Rule::EveryOther => i % 2 == 0 && i < last,
        })
        .map(|(_, &b)| b)
        .collect()
}

/// Class index of `value`: 0 for the highest threshold it reaches, counting
/// down the ascending `bounds`; -1 when it is below all of them.
pub fn assign_class(bounds: &[u32], value: f64) -> i32 {
    bounds
        .iter()
        .rev()
        .position(|&b| value >= b as f64)
        .map_or(-1, |i| i as i32)
}

#[derive(Debug)]
pub struct EventCorrector {
    params: CorrectionParameters,
    reweight: Option<[f64; REWEIGHT_PARAMS]>,
    bounds9: Vec<u32>,
    configured: bool,
    reported: AtomicBool,
}

impl EventCorrector {
    /// Build a corrector, failing on any missing or mis-sized parameter vector.
    ///
    /// An empty reweight vector disables reweighting (unit weights).
    pub fn new(params: CorrectionParameters) -> Result<Self> {
        if params.vz_polynomial.is_empty() || params.zdc_linear.is_empty() {
            return Err(CalibError::MissingCorrection(
                "zdc and vz correction parameters must be set before events can be corrected"
                    .to_string(),
            ));
        }
        check_len("centrality bounds", &params.centrality_bounds, CENTRALITY16_PARAMS)?;
        Self::build(params)
    }

    /// Build a corrector that tolerates empty vz/zdc parameters.
    ///
    /// Such a corrector reports the misconfiguration once and then turns
    /// every accepted event into the zero-weight sentinel.
    pub fn new_permissive(params: CorrectionParameters) -> Result<Self> {
        Self::build(params)
    }

    fn build(params: CorrectionParameters) -> Result<Self> {
        check_optional_len("zdc correction", &params.zdc_linear, ZDC_PARAMS)?;
        check_optional_len("vz correction", &params.vz_polynomial, VZ_PARAMS)?;
        check_optional_len("centrality bounds", &params.centrality_bounds, CENTRALITY16_PARAMS)?;
        check_optional_len("reweighting", &params.reweight, REWEIGHT_PARAMS)?;

        if params.centrality_bounds.windows(2).any(|w| w[0] > w[1]) {
            return Err(CalibError::InvalidConfig(format!(
                "centrality bounds must be ascending, got {:?}",
                params.centrality_bounds
            )));
        }
        for (name, w) in [("vz", params.vz_window), ("zdc", params.zdc_window)] {
            if !(w.min <= w.max) {
                return Err(CalibError::InvalidConfig(format!(
                    "{name} window [{}, {}] is empty",
                    w.min, w.max
                )));
            }
        }
        if let RunPolicy::Range { min, max } = params.run_policy {
            if min > max {
                return Err(CalibError::InvalidConfig(format!("run range [{min}, {max}] is empty")));
            }
        }

        let reweight = <[f64; REWEIGHT_PARAMS]>::try_from(params.reweight.as_slice()).ok();
        let bounds9 = centrality9_bounds(&params.centrality_bounds, params.centrality9_rule);
        let configured = !params.vz_polynomial.is_empty() && !params.zdc_linear.is_empty();

        Ok(Self {
            params,
            reweight,
            bounds9,
            configured,
            reported: AtomicBool::new(false),
        })
    }

    /// Whether vz, zdc and centrality parameters are all present.
    pub fn is_configured(&self) -> bool {
        self.configured && self.params.centrality_bounds.len() == CENTRALITY16_PARAMS
    }

    /// Event acceptance: non-negative multiplicity, run, vz and zdc windows.
    pub fn check_event(&self, run_id: Option<i64>, raw: f64, zdc: f64, vz: f64) -> bool {
        if !(raw >= 0.0) {
            return false;
        }
        if let RunPolicy::Range { min, max } = self.params.run_policy {
            match run_id {
                Some(run) if (min..=max).contains(&run) => {}
                _ => return false,
            }
        }
        self.params.vz_window.contains(vz) && self.params.zdc_window.contains(zdc)
    }

    pub fn correct(
        &self,
        run_id: Option<i64>,
        raw: f64,
        zdc: f64,
        vz: f64,
        rng: &mut RandomSource,
    ) -> EventCorrectionResult {
        if !self.check_event(run_id, raw, zdc, vz) {
            return EventCorrectionResult::rejected(raw);
        }
        if !self.configured {
            self.report_unconfigured();
            return EventCorrectionResult::unconfigured();
        }

        let dithered = raw + rng.uniform();
        let corrected = dithered * self.vz_correction(vz) * self.zdc_correction(zdc);

        let centrality16 = assign_class(&self.params.centrality_bounds, corrected);
        let centrality9 = assign_class(&self.bounds9, corrected);
        let weight = match self.reweight {
            Some(p) if centrality16 >= 0 && centrality9 >= 0 && corrected < self.params.reweight_bound => {
                reweight(&p, corrected)
            }
            _ => 1.0,
        };

        EventCorrectionResult {
            corrected_multiplicity: corrected,
            centrality16,
            centrality9,
            weight,
        }
    }

    /// `poly(vz_norm) / poly(vz)`; 1.0 where the polynomial is non-positive.
    pub fn vz_correction(&self, vz: f64) -> f64 {
        let at_event = power_sum(&self.params.vz_polynomial, vz);
        if !(at_event > 0.0) {
            return 1.0;
        }
        power_sum(&self.params.vz_polynomial, self.params.vz_normalization) / at_event
    }

    /// Linear luminosity correction with the rate taken in kHz.
    pub fn zdc_correction(&self, zdc: f64) -> f64 {
        let [p0, p1] = match self.params.zdc_linear.as_slice() {
            &[p0, p1] => [p0, p1],
            _ => return 1.0,
        };
        let at_event = p0 + p1 * zdc / 1000.0;
        if !(at_event > 0.0) {
            return 1.0;
        }
        (p0 + p1 * self.params.zdc_normalization / 1000.0) / at_event
    }

    fn report_unconfigured(&self) {
        if !self.reported.swap(true, Ordering::Relaxed) {
            error!(
                vz_params = self.params.vz_polynomial.len(),
                zdc_params = self.params.zdc_linear.len(),
                "zdc and vz correction parameters are missing; every event will get weight 0"
            );
        }
    }
}

fn check_len<T>(name: &'static str, values: &[T], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(CalibError::ParameterLength {
            name,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

fn check_optional_len<T>(name: &'static str, values: &[T], expected: usize) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    check_len(name, values, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::domain::Window;

    fn bounds16() -> Vec<u32> {
        vec![10, 15, 21, 29, 39, 51, 65, 82, 102, 125, 152, 184, 221, 263, 312, 370]
    }

    fn params() -> CorrectionParameters {
        CorrectionParameters {
            zdc_linear: vec![1.0, 0.0],
            vz_polynomial: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            centrality_bounds: bounds16(),
            ..CorrectionParameters::default()
        }
    }

    #[test]
    fn centrality9_rules_pick_expected_entries() {
        let b = bounds16();
        let nine = centrality9_bounds(&b, Centrality9Rule::EveryOtherPlusLast);
        assert_eq!(nine, vec![10, 21, 39, 65, 102, 152, 221, 312, 370]);
        let eight = centrality9_bounds(&b, Centrality9Rule::EveryOther);
        assert_eq!(eight, vec![10, 21, 39, 65, 102, 152, 221, 312]);
    }

    #[test]
    fn assign_class_counts_from_most_central() {
        let b = bounds16();
        assert_eq!(assign_class(&b, 1000.0), 0);
        assert_eq!(assign_class(&b, 370.0), 0);
        assert_eq!(assign_class(&b, 369.9), 1);
        assert_eq!(assign_class(&b, 10.0), 15);
        assert_eq!(assign_class(&b, 9.99), -1);
        assert_eq!(assign_class(&[], 50.0), -1);
    }

    #[test]
    fn check_event_applies_every_window() {
        let c = EventCorrector::new(params()).unwrap();
        assert!(c.check_event(None, 100.0, 5000.0, 0.0));
        assert!(!c.check_event(None, -1.0, 5000.0, 0.0));
        assert!(!c.check_event(None, 100.0, 5000.0, 30.5));
        assert!(!c.check_event(None, 100.0, -1.0, 0.0));
        assert!(!c.check_event(None, 100.0, 2.0e7, 0.0));
        assert!(c.check_event(None, 100.0, 1.0e7, -30.0));
    }

    #[test]
    fn run_range_policy_rejects_unknown_runs() {
        let c = EventCorrector::new(CorrectionParameters {
            run_policy: RunPolicy::Range { min: 100, max: 200 },
            ..params()
        })
        .unwrap();
        assert!(c.check_event(Some(150), 10.0, 0.0, 0.0));
        assert!(!c.check_event(Some(201), 10.0, 0.0, 0.0));
        assert!(!c.check_event(None, 10.0, 0.0, 0.0));
    }

    #[test]
    fn rejected_event_returns_sentinel() {
        let c = EventCorrector::new(params()).unwrap();
        let mut rng = RandomSource::from_seed(1);
        let r = c.correct(None, 123.0, 5000.0, 45.0, &mut rng);
        assert_eq!(r, EventCorrectionResult::rejected(123.0));
        assert_eq!(r.corrected_multiplicity, 123.0);
        assert_eq!((r.centrality16, r.centrality9, r.weight), (-1, -1, 0.0));
    }

    #[test]
    fn identity_corrections_only_dither() {
        let c = EventCorrector::new(params()).unwrap();
        let mut rng = RandomSource::from_seed(2);
        for _ in 0..100 {
            let r = c.correct(None, 300.0, 5000.0, 10.0, &mut rng);
            assert!(r.corrected_multiplicity >= 300.0 && r.corrected_multiplicity < 301.0);
            assert_eq!(r.centrality16, 2);
            assert_eq!(r.centrality9, 2);
            assert_eq!(r.weight, 1.0);
        }
    }

    #[test]
    fn vz_and_zdc_corrections_scale_to_normalization_points() {
        let c = EventCorrector::new(CorrectionParameters {
            // poly(vz) = 100 + 2 vz
            vz_polynomial: vec![100.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            // p0 + p1 * zdc/1000 = 50 + 0.5 * kHz
            zdc_linear: vec![50.0, 0.5],
            vz_normalization: 0.0,
            zdc_normalization: 0.0,
            ..params()
        })
        .unwrap();
        assert!((c.vz_correction(10.0) - 100.0 / 120.0).abs() < 1e-12);
        assert!((c.zdc_correction(20_000.0) - 50.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_polynomials_fall_back_to_unity() {
        let c = EventCorrector::new(CorrectionParameters {
            vz_polynomial: vec![-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            zdc_linear: vec![-5.0, 0.0],
            ..params()
        })
        .unwrap();
        assert_eq!(c.vz_correction(3.0), 1.0);
        assert_eq!(c.zdc_correction(1000.0), 1.0);
    }

    #[test]
    fn reweighting_applies_below_bound_only() {
        let c = EventCorrector::new(CorrectionParameters {
            reweight: vec![2.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            reweight_bound: 200.0,
            ..params()
        })
        .unwrap();
        let mut rng = RandomSource::from_seed(3);
        assert_eq!(c.correct(None, 100.0, 0.0, 0.0, &mut rng).weight, 2.0);
        assert_eq!(c.correct(None, 250.0, 0.0, 0.0, &mut rng).weight, 1.0);
        // Unassigned centrality keeps unit weight.
        assert_eq!(c.correct(None, 2.0, 0.0, 0.0, &mut rng).weight, 1.0);
    }

    #[test]
    fn strict_constructor_rejects_bad_lengths() {
        let err = EventCorrector::new(CorrectionParameters {
            vz_polynomial: vec![1.0; 6],
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, CalibError::ParameterLength { expected: 7, actual: 6, .. }));

        let err = EventCorrector::new(CorrectionParameters {
            centrality_bounds: vec![1, 2, 3],
            ..params()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 4);

        let err = EventCorrector::new(CorrectionParameters {
            zdc_linear: Vec::new(),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, CalibError::MissingCorrection(_)));
    }

    #[test]
    fn permissive_corrector_degrades_to_zero_weight() {
        let c = EventCorrector::new_permissive(CorrectionParameters {
            vz_polynomial: Vec::new(),
            ..params()
        })
        .unwrap();
        assert!(!c.is_configured());
        let mut rng = RandomSource::from_seed(4);
        for _ in 0..3 {
            let r = c.correct(None, 200.0, 0.0, 0.0, &mut rng);
            assert_eq!(r, EventCorrectionResult::unconfigured());
        }
        // Rejection still wins over misconfiguration.
        let r = c.correct(None, -5.0, 0.0, 0.0, &mut rng);
        assert_eq!(r, EventCorrectionResult::rejected(-5.0));
    }

    #[test]
    fn empty_windows_are_config_errors() {
        let err = EventCorrector::new(CorrectionParameters {
            vz_window: Window { min: 5.0, max: -5.0 },
            ..params()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    proptest! {
        #[test]
        fn centrality9_keeps_order_and_count(mut raw in proptest::collection::vec(0u32..2000, 16)) {
            raw.sort_unstable();
            let nine = centrality9_bounds(&raw, Centrality9Rule::EveryOtherPlusLast);
            prop_assert_eq!(nine.len(), 9);
            prop_assert!(nine.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(nine[8], raw[15]);
            prop_assert_eq!(nine[0], raw[0]);
        }

        #[test]
        fn assigned_class_bounds_the_value(mut raw in proptest::collection::vec(0u32..2000, 16), v in 0.0f64..2500.0) {
            raw.sort_unstable();
            let idx = assign_class(&raw, v);
            if idx < 0 {
                prop_assert!(v < raw[0] as f64);
            } else {
                let i = 15 - idx as usize;
                prop_assert!(v >= raw[i] as f64);
                if i < 15 {
                    prop_assert!(v < raw[i + 1] as f64);
                }
            }
        }
    }
}
