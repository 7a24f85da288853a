//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed between the scanner, comparator and corrector
//! - exported to JSON/CSV
//! - loaded from correction parameter files

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};

/// How the simulated histogram is scaled onto the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NormMode {
    /// Ratio of the full integrals.
    Integral,
    /// Ratio of integrals above the minimum multiplicity.
    Region,
    /// No scaling.
    Disabled,
}

/// Chi-square definition used to compare simulated and reference histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Chi2Mode {
    /// Normalized-shape comparison weighted by both histograms' errors.
    Generic,
    /// `Σ((ref − sim)/σ_ref)²` after scaling the simulation.
    Domain,
}

/// Detector response shared by every lattice point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorResponse {
    /// Efficiency in p+p-like (low multiplicity) events.
    pub pp_efficiency: f64,
    /// Efficiency in the most central A+A events.
    pub aa_efficiency: f64,
    /// Multiplicity that normalizes the efficiency slope.
    pub central_multiplicity: f64,
    /// Fraction of extra tracks added by the trigger; `1.0` disables it.
    pub trigger_bias: f64,
    /// Use `pp_efficiency` for every event.
    pub constant_efficiency: bool,
}

impl Default for DetectorResponse {
    fn default() -> Self {
        Self {
            pp_efficiency: 0.98,
            aa_efficiency: 0.84,
            central_multiplicity: 540.0,
            trigger_bias: 1.0,
            constant_efficiency: false,
        }
    }
}

impl DetectorResponse {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("pp efficiency", self.pp_efficiency),
            ("AA efficiency", self.aa_efficiency),
            ("trigger bias", self.trigger_bias),
        ] {
            if !(v.is_finite() && (0.0..=1.0).contains(&v)) {
                return Err(CalibError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {v}"
                )));
            }
        }
        if !(self.central_multiplicity.is_finite() && self.central_multiplicity > 0.0) {
            return Err(CalibError::InvalidConfig(format!(
                "central multiplicity must be > 0, got {}",
                self.central_multiplicity
            )));
        }
        Ok(())
    }
}

/// One Glauber + NBD model point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Mean multiplicity of a single p+p-like source.
    pub npp: f64,
    /// NBD shape parameter.
    pub k: f64,
    /// Hard-process fraction in the two-component model.
    pub x: f64,
    pub response: DetectorResponse,
}

impl ModelParameters {
    pub fn at(key: ParameterKey, response: DetectorResponse) -> Self {
        Self {
            npp: key.npp,
            k: key.k,
            x: key.x,
            response,
        }
    }

    pub fn key(&self) -> ParameterKey {
        ParameterKey::new(self.npp, self.k, self.x)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.npp.is_finite() && self.npp > 0.0) {
            return Err(CalibError::InvalidConfig(format!("npp must be > 0, got {}", self.npp)));
        }
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(CalibError::InvalidConfig(format!("k must be > 0, got {}", self.k)));
        }
        if !(self.x.is_finite() && (0.0..=1.0).contains(&self.x)) {
            return Err(CalibError::InvalidConfig(format!("x must lie in [0, 1], got {}", self.x)));
        }
        self.response.validate()
    }
}

/// Lattice coordinates `(npp, k, x)`, used to index scan results.
///
/// Equality and hashing are bit-exact. The text form
/// `npp_<v>_k_<v>_x_<v>` prints the shortest decimal that round-trips to the
/// same `f64`, so it parses back to an equal key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParameterKey {
    pub npp: f64,
    pub k: f64,
    pub x: f64,
}

impl ParameterKey {
    pub fn new(npp: f64, k: f64, x: f64) -> Self {
        Self { npp, k, x }
    }

    fn bits(&self) -> (u64, u64, u64) {
        (self.npp.to_bits(), self.k.to_bits(), self.x.to_bits())
    }
}

impl PartialEq for ParameterKey {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for ParameterKey {}

impl Hash for ParameterKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "npp_{}_k_{}_x_{}", self.npp, self.k, self.x)
    }
}

impl FromStr for ParameterKey {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || CalibError::MalformedInput(format!("invalid parameter key '{s}'"));
        let parts: Vec<&str> = s.split('_').collect();
        let [p_tag, npp, k_tag, k, x_tag, x] = parts.as_slice() else {
            return Err(bad());
        };
        if (*p_tag, *k_tag, *x_tag) != ("npp", "k", "x") {
            return Err(bad());
        }
        let parse = |v: &str| v.parse::<f64>().map_err(|_| bad());
        Ok(Self::new(parse(npp)?, parse(k)?, parse(x)?))
    }
}

/// One scanned axis: `steps` linearly spaced values over `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanAxis {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

/// Full configuration of a grid scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub npp: ScanAxis,
    pub k: ScanAxis,
    pub x: ScanAxis,
    pub response: DetectorResponse,
    /// Simulated events per lattice point.
    pub events: u64,
    /// Events for the final high-statistics refit of the best point.
    pub refit_events: u64,
    pub norm_mode: NormMode,
    pub chi2_mode: Chi2Mode,
    /// Multiplicity below which bins are ignored by the comparison.
    pub min_multiplicity: f64,
    pub seed: u64,
    /// Keep every point's simulated histogram in the result set.
    pub keep_histograms: bool,
    /// Upper multiplicity of the reweight fit to the final ratio.
    pub reweight_bound: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            npp: ScanAxis { min: 1.0, max: 4.0, steps: 31 },
            k: ScanAxis { min: 1.0, max: 4.0, steps: 31 },
            x: ScanAxis { min: 0.1, max: 0.4, steps: 31 },
            response: DetectorResponse::default(),
            events: 100_000,
            refit_events: 1_000_000,
            norm_mode: NormMode::Region,
            chi2_mode: Chi2Mode::Domain,
            min_multiplicity: 100.0,
            seed: 252_452,
            keep_histograms: false,
            reweight_bound: 400.0,
        }
    }
}

/// Scaling of the cross-section used for centrality class edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XSecMod {
    Nominal,
    Plus5,
    Minus5,
}

impl XSecMod {
    pub fn factor(self) -> f64 {
        match self {
            XSecMod::Nominal => 1.0,
            XSecMod::Plus5 => 1.05,
            XSecMod::Minus5 => 0.95,
        }
    }
}

/// Which runs an event corrector accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunPolicy {
    /// Every run id is accepted.
    #[default]
    Agnostic,
    /// Only runs in `[min, max]`; events without a run id are rejected.
    Range { min: i64, max: i64 },
}

/// How 9 centrality bounds are picked from the 16 fine ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Centrality9Rule {
    /// Even indices plus the last one: 9 bounds.
    #[default]
    EveryOtherPlusLast,
    /// Even indices below 15: 8 bounds.
    EveryOther,
}

/// Inclusive `[min, max]` acceptance window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub min: f64,
    pub max: f64,
}

impl Window {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Everything an event corrector needs, as loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionParameters {
    /// Luminosity correction `p0 + p1·zdc/1000` (2 values).
    pub zdc_linear: Vec<f64>,
    /// vz correction power-sum coefficients (7 values).
    pub vz_polynomial: Vec<f64>,
    /// Lower multiplicity bound of each 5% class, most peripheral first (16 values).
    pub centrality_bounds: Vec<u32>,
    /// Reweighting coefficients (7 values, or empty to disable).
    pub reweight: Vec<f64>,
    /// Events at or above this corrected multiplicity get unit weight.
    pub reweight_bound: f64,
    pub vz_window: Window,
    pub zdc_window: Window,
    /// vz the correction normalizes to.
    pub vz_normalization: f64,
    /// zdc rate the correction normalizes to.
    pub zdc_normalization: f64,
    pub run_policy: RunPolicy,
    pub centrality9_rule: Centrality9Rule,
}

impl Default for CorrectionParameters {
    fn default() -> Self {
        Self {
            zdc_linear: Vec::new(),
            vz_polynomial: Vec::new(),
            centrality_bounds: Vec::new(),
            reweight: Vec::new(),
            reweight_bound: 400.0,
            vz_window: Window { min: -30.0, max: 30.0 },
            zdc_window: Window { min: 0.0, max: 1.0e7 },
            vz_normalization: 0.0,
            zdc_normalization: 0.0,
            run_policy: RunPolicy::Agnostic,
            centrality9_rule: Centrality9Rule::EveryOtherPlusLast,
        }
    }
}

/// Output of correcting one event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventCorrectionResult {
    pub corrected_multiplicity: f64,
    /// 5% class index, 0 = most central; -1 when unassigned.
    pub centrality16: i32,
    pub centrality9: i32,
    pub weight: f64,
}

impl EventCorrectionResult {
    /// Result for an event that failed the acceptance cuts.
    pub fn rejected(raw: f64) -> Self {
        Self {
            corrected_multiplicity: raw,
            centrality16: -1,
            centrality9: -1,
            weight: 0.0,
        }
    }

    /// Result when the corrector is missing vz or luminosity parameters.
    pub fn unconfigured() -> Self {
        Self {
            corrected_multiplicity: 0.0,
            centrality16: -1,
            centrality9: -1,
            weight: 0.0,
        }
    }
}
