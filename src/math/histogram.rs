//! Uniformly binned 1D histogram with per-bin statistical errors.
//!
//! Bins are addressed 0-based. Values below `x_min` land in the underflow,
//! values at or above `x_max` in the overflow; neither takes part in
//! integrals or comparisons.

use serde::Serialize;

use crate::error::{CalibError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram1D {
    name: String,
    title: String,
    x_min: f64,
    x_max: f64,
    contents: Vec<f64>,
    /// Sum of squared weights per bin.
    sumw2: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
}

impl Histogram1D {
    /// Create an empty histogram with `n_bins` uniform bins over `[x_min, x_max)`.
    pub fn new(name: impl Into<String>, n_bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        validate_axis(n_bins, x_min, x_max)?;
        Ok(Self {
            name: name.into(),
            title: String::new(),
            x_min,
            x_max,
            contents: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    /// Build a histogram from stored bin contents.
    ///
    /// Without explicit errors every bin is treated as a Poisson count
    /// (`error = sqrt(|content|)`).
    pub fn from_contents(
        name: impl Into<String>,
        x_min: f64,
        x_max: f64,
        contents: Vec<f64>,
        errors: Option<Vec<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        validate_axis(contents.len(), x_min, x_max)?;
        if contents.iter().any(|c| !c.is_finite()) {
            return Err(CalibError::MalformedInput(format!(
                "histogram '{name}' has non-finite bin contents"
            )));
        }

        let sumw2 = match errors {
            Some(errors) => {
                if errors.len() != contents.len() {
                    return Err(CalibError::MalformedInput(format!(
                        "histogram '{name}': {} errors for {} bins",
                        errors.len(),
                        contents.len()
                    )));
                }
                if errors.iter().any(|e| !e.is_finite() || *e < 0.0) {
                    return Err(CalibError::MalformedInput(format!(
                        "histogram '{name}' has negative or non-finite errors"
                    )));
                }
                errors.iter().map(|e| e * e).collect()
            }
            None => contents.iter().map(|c| c.abs()).collect(),
        };

        let entries = contents.iter().filter(|c| **c > 0.0).map(|c| c.round() as u64).sum();
        Ok(Self {
            name,
            title: String::new(),
            x_min,
            x_max,
            contents,
            sumw2,
            underflow: 0.0,
            overflow: 0.0,
            entries,
        })
    }

    /// An empty histogram with the same binning.
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            x_min: self.x_min,
            x_max: self.x_max,
            contents: vec![0.0; self.contents.len()],
            sumw2: vec![0.0; self.contents.len()],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn n_bins(&self) -> usize {
        self.contents.len()
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.contents.len() as f64
    }

    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.x_min + bin as f64 * self.bin_width()
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin) + 0.5 * self.bin_width()
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn content(&self, bin: usize) -> f64 {
        self.contents[bin]
    }

    /// Statistical error of a bin, `sqrt(Σw²)`.
    pub fn error(&self, bin: usize) -> f64 {
        self.sumw2[bin].sqrt()
    }

    pub fn errors(&self) -> Vec<f64> {
        self.sumw2.iter().map(|v| v.sqrt()).collect()
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Regular bin containing `x`, or `None` for under/overflow.
    pub fn bin_of(&self, x: f64) -> Option<usize> {
        if !(x >= self.x_min && x < self.x_max) {
            return None;
        }
        let bin = ((x - self.x_min) / self.bin_width()) as usize;
        Some(bin.min(self.contents.len() - 1))
    }

    /// First regular bin whose range reaches `x`.
    ///
    /// Returns `0` below the axis and `n_bins` (an empty tail) at or above
    /// `x_max`, so `first_bin_from(x)..n_bins` is always a valid range.
    pub fn first_bin_from(&self, x: f64) -> usize {
        if x < self.x_min {
            return 0;
        }
        self.bin_of(x).unwrap_or(self.contents.len())
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        self.entries += 1;
        match self.bin_of(x) {
            Some(bin) => {
                self.contents[bin] += weight;
                self.sumw2[bin] += weight * weight;
            }
            None if x < self.x_min => self.underflow += weight,
            None => self.overflow += weight,
        }
    }

    /// Sum of all regular bins.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Sum of regular bins in `[first, last)`.
    pub fn integral_range(&self, first: usize, last: usize) -> f64 {
        let last = last.min(self.contents.len());
        if first >= last {
            return 0.0;
        }
        self.contents[first..last].iter().sum()
    }

    /// Multiply every bin by `factor` (errors scale linearly).
    pub fn scale(&mut self, factor: f64) {
        let f2 = factor * factor;
        for (c, w2) in self.contents.iter_mut().zip(self.sumw2.iter_mut()) {
            *c *= factor;
            *w2 *= f2;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }

    pub fn same_binning(&self, other: &Histogram1D) -> bool {
        self.contents.len() == other.contents.len()
            && self.x_min == other.x_min
            && self.x_max == other.x_max
    }

    /// Bin-wise ratio `self / denominator` with uncorrelated error propagation.
    ///
    /// Bins with a zero denominator are set to zero.
    pub fn divide(&self, denominator: &Histogram1D, name: impl Into<String>) -> Result<Histogram1D> {
        if !self.same_binning(denominator) {
            return Err(CalibError::MalformedInput(format!(
                "cannot divide '{}' by '{}': binning differs",
                self.name, denominator.name
            )));
        }

        let mut out = self.empty_like(name);
        for bin in 0..self.contents.len() {
            let a = self.contents[bin];
            let b = denominator.contents[bin];
            if b == 0.0 {
                continue;
            }
            let b2 = b * b;
            out.contents[bin] = a / b;
            out.sumw2[bin] = (self.sumw2[bin] * b2 + denominator.sumw2[bin] * a * a) / (b2 * b2);
        }
        out.entries = self.entries;
        Ok(out)
    }
}

fn validate_axis(n_bins: usize, x_min: f64, x_max: f64) -> Result<()> {
    if n_bins == 0 {
        return Err(CalibError::MalformedInput("histogram has no bins".to_string()));
    }
    if !(x_min.is_finite() && x_max.is_finite() && x_max > x_min) {
        return Err(CalibError::MalformedInput(format!(
            "invalid histogram axis [{x_min}, {x_max})"
        )));
    }
    Ok(())
}
