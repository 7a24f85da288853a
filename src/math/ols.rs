//! Weighted linear least squares.
//!
//! Solves
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! by scaling rows with `sqrt(w_i)` and solving the resulting tall system
//! with an SVD. Columns are equilibrated to unit norm first: the reweight
//! basis mixes `u²` and `1/u²` terms whose scales differ by many orders of
//! magnitude.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub beta: DVector<f64>,
    /// Weighted residual sum of squares.
    pub chi2: f64,
}

/// Returns `None` when the system is singular or the solution is not finite.
pub fn weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    w: &DVector<f64>,
) -> Option<LeastSquares> {
    if x.nrows() != y.len() || x.nrows() != w.len() || x.nrows() < x.ncols() {
        return None;
    }

    let sqrt_w = w.map(|v| v.max(0.0).sqrt());
    let mut a = x.clone();
    for (mut row, s) in a.row_iter_mut().zip(sqrt_w.iter()) {
        row *= *s;
    }
    let b = y.component_mul(&sqrt_w);

    let norms: Vec<f64> = a.column_iter().map(|c| c.norm()).collect();
    if norms.iter().any(|n| !(n.is_finite() && *n > 0.0)) {
        return None;
    }
    for (mut col, n) in a.column_iter_mut().zip(&norms) {
        col /= *n;
    }

    let svd = a.clone().svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        let Ok(scaled) = svd.solve(&b, tol) else {
            continue;
        };
        if !scaled.iter().all(|v| v.is_finite()) {
            continue;
        }
        let residual = &b - &a * &scaled;
        let beta = DVector::from_iterator(
            scaled.len(),
            scaled.iter().zip(&norms).map(|(v, n)| v / n),
        );
        return Some(LeastSquares {
            beta,
            chi2: residual.norm_squared(),
        });
    }
    None
}
