//! Dense least squares helpers.
//!
//! The solver repeatedly solves small, tall linear systems of the form:
//!
//! ```text
//! minimize ‖A δ - b‖²
//! ```
//!
//! where `A` is the Jacobian stacked on top of the damping rows. We use SVD so
//! the solve stays robust when a Jacobian column degenerates (e.g. `Io → 0`
//! makes the `B` column vanish). Nalgebra's `QR::solve` is intended for square
//! systems and will panic for non-square matrices.

use nalgebra::{DMatrix, DVector};

/// Relative singular value cutoff below which a Jacobian is treated as rank deficient.
const RANK_TOL: f64 = 1e-12;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Invert `JᵀJ` through the SVD of `J`.
///
/// Returns `None` when `J` is rank deficient (relative to its largest singular
/// value) or the result is not finite; a fit whose parameters cannot all be
/// resolved has no meaningful covariance.
pub fn normal_matrix_inverse(j: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let p = j.ncols();
    if p == 0 || j.nrows() < p {
        return None;
    }

    let svd = j.clone().svd(false, true);
    let v_t = svd.v_t?;
    let s_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    if !(s_max.is_finite() && s_max > 0.0) {
        return None;
    }
    if svd.singular_values.iter().any(|&s| s <= s_max * RANK_TOL) {
        return None;
    }

    // (JᵀJ)⁻¹ = V Σ⁻² Vᵀ
    let mut inv = DMatrix::<f64>::zeros(p, p);
    for (k, &s) in svd.singular_values.iter().enumerate() {
        let w = 1.0 / (s * s);
        let v = v_t.row(k).transpose();
        inv += &v * v.transpose() * w;
    }

    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
