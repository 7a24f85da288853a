//! Seedable random source shared by the simulation and the event corrector.
//!
//! Every parallel unit of work gets its own stream derived from the run seed
//! and a hashable tag, so results do not depend on thread scheduling.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Binomial, Poisson};

#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Independent stream for `(seed, tag)`.
    pub fn for_stream<T: Hash + ?Sized>(seed: u64, tag: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        tag.hash(&mut hasher);
        Self::from_seed(hasher.finish())
    }

    /// Uniform in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    pub fn sample<T, D: Distribution<T>>(&mut self, dist: &D) -> T {
        dist.sample(&mut self.rng)
    }

    /// Poisson count with mean `lambda`; zero for non-positive means.
    pub fn poisson(&mut self, lambda: f64) -> u64 {
        if !(lambda > 0.0) {
            return 0;
        }
        match Poisson::new(lambda) {
            Ok(dist) => {
                let v: f64 = dist.sample(&mut self.rng);
                v as u64
            }
            Err(_) => 0,
        }
    }

    /// Binomial count of successes in `n` trials with probability `p`
    /// (clamped to `[0, 1]`).
    pub fn binomial(&mut self, n: u64, p: f64) -> u64 {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        if n == 0 || p == 0.0 {
            return 0;
        }
        if p == 1.0 {
            return n;
        }
        match Binomial::new(n, p) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0,
        }
    }
}
