//! Joint Npart × Ncoll probability table from a Glauber Monte Carlo.
//!
//! The table is a 2D histogram over (Npart, Ncoll). Sampling picks a bin with
//! probability proportional to its mass, draws a uniform point inside the
//! bin and truncates both coordinates to integers.

use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};
use crate::random::RandomSource;

/// Uniform binning of one table axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableAxis {
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

impl TableAxis {
    fn validate(&self, label: &str) -> Result<()> {
        if self.bins == 0 {
            return Err(CalibError::MalformedInput(format!("{label} axis has no bins")));
        }
        if !(self.min.is_finite() && self.max.is_finite() && self.max > self.min) {
            return Err(CalibError::MalformedInput(format!(
                "{label} axis range [{}, {}) is invalid",
                self.min, self.max
            )));
        }
        Ok(())
    }

    fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }
}

#[derive(Debug, Clone)]
pub struct ParticipantCollisionTable {
    npart: TableAxis,
    ncoll: TableAxis,
    /// Cumulative bin mass, Npart-major (`ix * ncoll.bins + iy`).
    cumulative: Vec<f64>,
}

impl ParticipantCollisionTable {
    /// Build a table from per-bin mass laid out Npart-major.
    ///
    /// Fails when the table holds no positive probability mass.
    pub fn new(npart: TableAxis, ncoll: TableAxis, mass: &[f64]) -> Result<Self> {
        npart.validate("Npart")?;
        ncoll.validate("Ncoll")?;

        let expected = npart.bins * ncoll.bins;
        if mass.len() != expected {
            return Err(CalibError::MalformedInput(format!(
                "Npart×Ncoll table has {} cells, expected {expected}",
                mass.len()
            )));
        }
        if mass.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(CalibError::MalformedInput(
                "Npart×Ncoll table contains negative or non-finite cells".to_string(),
            ));
        }

        let mut running = 0.0;
        let cumulative: Vec<f64> = mass
            .iter()
            .map(|m| {
                running += m;
                running
            })
            .collect();

        if running <= 0.0 {
            return Err(CalibError::MalformedInput(
                "Npart×Ncoll table has no bins with positive probability".to_string(),
            ));
        }

        Ok(Self {
            npart,
            ncoll,
            cumulative,
        })
    }

    pub fn npart_axis(&self) -> TableAxis {
        self.npart
    }

    pub fn ncoll_axis(&self) -> TableAxis {
        self.ncoll
    }

    pub fn total_mass(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Draw one (Npart, Ncoll) pair.
    pub fn sample(&self, rng: &mut RandomSource) -> (u32, u32) {
        let u = rng.uniform() * self.total_mass();
        // Zero-mass cells never satisfy `c > u`, so they are never picked.
        let cell = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.cumulative.len() - 1);

        let ix = cell / self.ncoll.bins;
        let iy = cell % self.ncoll.bins;
        let npart = self.npart.min + (ix as f64 + rng.uniform()) * self.npart.width();
        let ncoll = self.ncoll.min + (iy as f64 + rng.uniform()) * self.ncoll.width();
        (truncate(npart), truncate(ncoll))
    }
}

fn truncate(v: f64) -> u32 {
    // `as` saturates: negatives become 0.
    v.trunc() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(bins: usize, min: f64, max: f64) -> TableAxis {
        TableAxis { bins, min, max }
    }

    #[test]
    fn rejects_table_without_positive_mass() {
        let err = ParticipantCollisionTable::new(axis(2, 0.0, 2.0), axis(2, 0.0, 2.0), &[0.0; 4])
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn rejects_cell_count_mismatch() {
        assert!(
            ParticipantCollisionTable::new(axis(2, 0.0, 2.0), axis(3, 0.0, 3.0), &[1.0; 4]).is_err()
        );
    }

    #[test]
    fn samples_only_from_populated_cells() {
        // Only cell (npart bin 3, ncoll bin 1) carries mass.
        let mut mass = vec![0.0; 5 * 4];
        mass[3 * 4 + 1] = 2.5;
        let table =
            ParticipantCollisionTable::new(axis(5, 0.0, 10.0), axis(4, 0.0, 20.0), &mass).unwrap();

        let mut rng = RandomSource::from_seed(11);
        for _ in 0..1000 {
            let (npart, ncoll) = table.sample(&mut rng);
            assert!((6..8).contains(&npart), "npart {npart}");
            assert!((5..10).contains(&ncoll), "ncoll {ncoll}");
        }
    }

    #[test]
    fn sampling_follows_cell_weights() {
        let table =
            ParticipantCollisionTable::new(axis(2, 0.0, 2.0), axis(1, 0.0, 1.0), &[1.0, 3.0]).unwrap();
        let mut rng = RandomSource::from_seed(3);
        let n = 40_000;
        let high = (0..n).filter(|_| table.sample(&mut rng).0 == 1).count();
        let frac = high as f64 / n as f64;
        assert!((frac - 0.75).abs() < 0.01, "fraction {frac}");
    }
}
