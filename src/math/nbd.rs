//! Negative binomial distribution parameterized by mean `npp` and shape `k`.
//!
//! Sampling uses the Gamma–Poisson mixture: draw `λ ~ Gamma(k, npp/k)` and
//! then `n ~ Poisson(λ)`.

use rand_distr::Gamma;
use statrs::function::gamma::ln_gamma;

use crate::error::{CalibError, Result};
use crate::random::RandomSource;

#[derive(Debug, Clone)]
pub struct NegativeBinomial {
    npp: f64,
    k: f64,
    gamma: Gamma<f64>,
}

impl NegativeBinomial {
    pub fn new(npp: f64, k: f64) -> Result<Self> {
        if !(npp.is_finite() && npp > 0.0) {
            return Err(CalibError::InvalidConfig(format!("NBD mean must be > 0, got {npp}")));
        }
        if !(k.is_finite() && k > 0.0) {
            return Err(CalibError::InvalidConfig(format!("NBD shape k must be > 0, got {k}")));
        }
        let gamma = Gamma::new(k, npp / k)
            .map_err(|e| CalibError::InvalidConfig(format!("NBD gamma mixture: {e}")))?;
        Ok(Self { npp, k, gamma })
    }

    pub fn npp(&self) -> f64 {
        self.npp
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    /// One NBD variate.
    pub fn sample(&self, rng: &mut RandomSource) -> u64 {
        let lambda = rng.sample(&self.gamma);
        rng.poisson(lambda)
    }

    /// Sum of `m` independent variates (the convolution NBD(m·npp, m·k)).
    pub fn sample_sum(&self, m: u64, rng: &mut RandomSource) -> u64 {
        (0..m).map(|_| self.sample(rng)).sum()
    }

    /// Probability of `n` counts for the `m`-fold convolution.
    ///
    /// `m == 0` is the degenerate distribution at zero.
    pub fn pmf(&self, n: u64, m: u64) -> f64 {
        if m == 0 {
            return if n == 0 { 1.0 } else { 0.0 };
        }
        let km = self.k * m as f64;
        let nf = n as f64;
        let ratio = self.npp / self.k;
        let ln_coef = ln_gamma(nf + km) - ln_gamma(nf + 1.0) - ln_gamma(km);
        let ln_tail = nf * ratio.ln() - (nf + km) * (ratio + 1.0).ln();
        (ln_coef + ln_tail).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_parameters() {
        assert!(NegativeBinomial::new(0.0, 1.0).is_err());
        assert!(NegativeBinomial::new(2.0, -1.0).is_err());
        assert!(NegativeBinomial::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn pmf_sums_to_one_and_has_expected_mean() {
        let nbd = NegativeBinomial::new(2.38, 2.0).unwrap();
        let m = 3;
        let (mut total, mut mean) = (0.0, 0.0);
        for n in 0..400 {
            let p = nbd.pmf(n, m);
            total += p;
            mean += n as f64 * p;
        }
        assert!((total - 1.0).abs() < 1e-9, "total {total}");
        assert!((mean - 3.0 * 2.38).abs() < 1e-6, "mean {mean}");
    }

    #[test]
    fn pmf_single_source_matches_closed_form() {
        // k = 1 is geometric: P(0) = 1 / (1 + npp)
        let nbd = NegativeBinomial::new(3.0, 1.0).unwrap();
        assert!((nbd.pmf(0, 1) - 0.25).abs() < 1e-12);
        assert_eq!(nbd.pmf(5, 0), 0.0);
        assert_eq!(nbd.pmf(0, 0), 1.0);
    }

    #[test]
    fn sample_mean_and_variance_follow_npp_and_k() {
        let nbd = NegativeBinomial::new(2.0, 1.5).unwrap();
        let mut rng = RandomSource::from_seed(252_452);
        let n = 200_000;
        let draws: Vec<f64> = (0..n).map(|_| nbd.sample(&mut rng) as f64).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        // var = npp (1 + npp/k) = 2 * (1 + 4/3)
        assert!((mean - 2.0).abs() < 0.03, "mean {mean}");
        assert!((var - 14.0 / 3.0).abs() < 0.15, "var {var}");
    }
}
