//! Small polynomial helpers used by the per-event corrections.

/// Evaluate `Σ c_i · x^i`.
pub fn power_sum(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Rational reweighting function.
///
/// With `u = x·p2 + p3`:
/// `w = p0 + p1/u + p4·u + p5/u² + p6·u²`.
pub fn reweight(p: &[f64; 7], x: f64) -> f64 {
    let u = x * p[2] + p[3];
    p[0] + p[1] / u + p[4] * u + p[5] / (u * u) + p[6] * u * u
}
