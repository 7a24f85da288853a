//! Two-component Glauber + NBD multiplicity model.
//!
//! For a collision with `Npart` participants and `Ncoll` binary collisions:
//!
//! - the number of particle-producing sources is
//!   `(1 − x)·Npart/2 + x·Ncoll`, rounded to the nearest integer; a pure
//!   soft model (`x = 0`) uses `Npart` sources
//! - each source emits an NBD(npp, k) number of particles
//! - every particle is detected with a multiplicity dependent efficiency
//! - an optional trigger bias adds a binomial fraction of extra tracks

use crate::domain::ModelParameters;
use crate::error::Result;
use crate::math::{Histogram1D, NegativeBinomial, ParticipantCollisionTable};
use crate::random::RandomSource;

#[derive(Debug, Clone)]
pub struct MultiplicityModel {
    params: ModelParameters,
    nbd: NegativeBinomial,
}

impl MultiplicityModel {
    pub fn new(params: ModelParameters) -> Result<Self> {
        params.validate()?;
        let nbd = NegativeBinomial::new(params.npp, params.k)?;
        Ok(Self { params, nbd })
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    /// Mean number of sources for one collision.
    pub fn two_component(&self, npart: f64, ncoll: f64) -> f64 {
        let x = self.params.x;
        if x == 0.0 {
            return npart;
        }
        (1.0 - x) * npart / 2.0 + x * ncoll
    }

    /// Detection efficiency for an event with `multiplicity` produced tracks.
    ///
    /// `pp·(1 − m·(pp − aa)/central)`, clamped to `[0, 1]`.
    pub fn efficiency(&self, multiplicity: u64) -> f64 {
        let r = &self.params.response;
        if r.constant_efficiency {
            return r.pp_efficiency;
        }
        let drop = multiplicity as f64 * (r.pp_efficiency - r.aa_efficiency) / r.central_multiplicity;
        (r.pp_efficiency * (1.0 - drop)).clamp(0.0, 1.0)
    }

    /// Detected multiplicity of one collision.
    pub fn multiplicity(&self, npart: u32, ncoll: u32, rng: &mut RandomSource) -> u64 {
        let sources = self.two_component(npart as f64, ncoll as f64).round().max(0.0) as u64;
        let ideal = self.nbd.sample_sum(sources, rng);

        let detected = rng.binomial(ideal, self.efficiency(ideal));

        let bias = self.params.response.trigger_bias;
        if bias == 1.0 {
            return detected;
        }
        detected + rng.binomial(detected, bias)
    }

    /// Simulate one event from the Glauber table.
    ///
    /// Returns `None` for draws with `Npart < 2` or `Ncoll < 1`, which do not
    /// correspond to an inelastic collision.
    pub fn sample_event(
        &self,
        table: &ParticipantCollisionTable,
        rng: &mut RandomSource,
    ) -> Option<u64> {
        let (npart, ncoll) = table.sample(rng);
        if npart < 2 || ncoll < 1 {
            return None;
        }
        Some(self.multiplicity(npart, ncoll, rng))
    }

    /// NBD probabilities for a fixed collision geometry, one bin per count.
    ///
    /// The source count includes the trigger bias and the detection efficiency
    /// up front, so this is the smooth expectation of `multiplicity` rather
    /// than a sampled distribution.
    pub fn expected_distribution(&self, npart: f64, ncoll: f64, n_bins: usize) -> Result<Histogram1D> {
        let nch = (self.two_component(npart, ncoll) * self.params.response.trigger_bias)
            .round()
            .max(0.0) as u64;
        let eff = self.efficiency(nch);
        let n_sampled = (nch as f64 * eff).round().max(0.0) as u64;

        let mut h = Histogram1D::new(
            format!("expected_{npart}_{ncoll}"),
            n_bins,
            0.0,
            n_bins as f64,
        )?;
        for n in 0..n_bins {
            let p = self.nbd.pmf(n as u64, n_sampled);
            if p > 0.0 && p.is_finite() {
                h.fill_weighted(n as f64 + 0.5, p);
            }
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::{DetectorResponse, ParameterKey};
    use crate::math::TableAxis;

    fn model(x: f64, response: DetectorResponse) -> MultiplicityModel {
        MultiplicityModel::new(ModelParameters::at(ParameterKey::new(2.38, 2.0, x), response))
            .unwrap()
    }

    #[test]
    fn two_component_mixes_soft_and_hard_sources() {
        let m = model(0.13, DetectorResponse::default());
        let v = m.two_component(100.0, 300.0);
        assert!((v - (0.87 * 50.0 + 0.13 * 300.0)).abs() < 1e-12);
        // x = 0 counts every participant as a source
        let soft = model(0.0, DetectorResponse::default());
        assert_eq!(soft.two_component(100.0, 300.0), 100.0);
        let tiny = model(1e-9, DetectorResponse::default());
        assert!((tiny.two_component(100.0, 300.0) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn efficiency_interpolates_and_clamps() {
        let m = model(0.13, DetectorResponse::default());
        assert!((m.efficiency(0) - 0.98).abs() < 1e-12);
        // 0.98 * (1 - 0.14) and 0.98 * (1 - 0.07)
        assert!((m.efficiency(540) - 0.8428).abs() < 1e-12);
        assert!((m.efficiency(270) - 0.9114).abs() < 1e-12);
        assert_eq!(m.efficiency(1_000_000), 0.0);

        let constant = model(
            0.13,
            DetectorResponse {
                constant_efficiency: true,
                ..DetectorResponse::default()
            },
        );
        assert_eq!(constant.efficiency(5000), 0.98);
    }

    #[test]
    fn perfect_detector_reproduces_nbd_mean() {
        let response = DetectorResponse {
            pp_efficiency: 1.0,
            aa_efficiency: 1.0,
            constant_efficiency: true,
            ..DetectorResponse::default()
        };
        let m = model(0.0, response);
        let mut rng = RandomSource::from_seed(5);
        let n = 20_000;
        // x = 0: Npart = 20 sources → mean 47.6
        let mean = (0..n).map(|_| m.multiplicity(20, 10, &mut rng) as f64).sum::<f64>() / n as f64;
        assert!((mean - 47.6).abs() < 0.4, "mean {mean}");
    }

    #[test]
    fn trigger_bias_adds_tracks() {
        let base = DetectorResponse {
            constant_efficiency: true,
            ..DetectorResponse::default()
        };
        let biased = DetectorResponse {
            trigger_bias: 0.5,
            ..base
        };
        let (a, b) = (model(0.2, base), model(0.2, biased));
        let mut ra = RandomSource::from_seed(9);
        let mut rb = RandomSource::from_seed(9);
        let n = 5_000;
        let ma = (0..n).map(|_| a.multiplicity(100, 200, &mut ra) as f64).sum::<f64>() / n as f64;
        let mb = (0..n).map(|_| b.multiplicity(100, 200, &mut rb) as f64).sum::<f64>() / n as f64;
        assert!((mb / ma - 1.5).abs() < 0.02, "ratio {}", mb / ma);
    }

    #[test]
    fn sample_event_rejects_non_collisions() {
        // Single populated cell at Npart ∈ [1, 2), Ncoll ∈ [0, 1).
        let table = ParticipantCollisionTable::new(
            TableAxis { bins: 1, min: 1.0, max: 2.0 },
            TableAxis { bins: 1, min: 0.0, max: 1.0 },
            &[1.0],
        )
        .unwrap();
        let m = model(0.13, DetectorResponse::default());
        let mut rng = RandomSource::from_seed(1);
        assert!((0..100).all(|_| m.sample_event(&table, &mut rng).is_none()));
    }

    #[test]
    fn expected_distribution_is_normalized() {
        let m = model(0.13, DetectorResponse::default());
        let h = m.expected_distribution(50.0, 80.0, 1000).unwrap();
        assert_eq!(h.n_bins(), 1000);
        assert!((h.integral() - 1.0).abs() < 1e-6, "integral {}", h.integral());
    }
}
