//! Parameter lattice generation.
//!
//! The scan is a deterministic full grid over `(npp, k, x)`. Each axis is
//! linearly spaced with both endpoints included; a single-step axis pins the
//! parameter at its minimum.

use crate::domain::{ParameterKey, ScanAxis};
use crate::error::{CalibError, Result};

/// Generate `steps` linearly spaced points between `min` and `max` (inclusive).
pub fn lin_space(name: &str, axis: ScanAxis) -> Result<Vec<f64>> {
    let ScanAxis { min, max, steps } = axis;
    if steps == 0 {
        return Err(CalibError::InvalidConfig(format!("{name} steps must be >= 1.")));
    }
    if !(min.is_finite() && max.is_finite()) {
        return Err(CalibError::InvalidConfig(format!(
            "Invalid {name} range: min={min}, max={max} (must be finite)."
        )));
    }
    if steps == 1 {
        return Ok(vec![min]);
    }
    if max <= min {
        return Err(CalibError::InvalidConfig(format!(
            "Invalid {name} range: min={min}, max={max} (max must exceed min when scanning)."
        )));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out: Vec<f64> = (0..steps).map(|i| min + step * i as f64).collect();
    // Pin the last point exactly on the requested maximum.
    if let Some(last) = out.last_mut() {
        *last = max;
    }
    Ok(out)
}

/// Full lattice in scan order: npp outermost, then k, then x.
pub fn parameter_lattice(npp: ScanAxis, k: ScanAxis, x: ScanAxis) -> Result<Vec<ParameterKey>> {
    let npp_values = lin_space("npp", npp)?;
    let k_values = lin_space("k", k)?;
    let x_values = lin_space("x", x)?;

    let mut out = Vec::with_capacity(npp_values.len() * k_values.len() * x_values.len());
    for &n in &npp_values {
        for &kv in &k_values {
            for &xv in &x_values {
                out.push(ParameterKey::new(n, kv, xv));
            }
        }
    }
    Ok(out)
}
