//! Bounded Levenberg–Marquardt solver.
//!
//! Each trial step solves the damped Gauss–Newton problem
//!
//! ```text
//! minimize ‖J δ + r‖² + λ Σ_j d_j δ_j²      with d_j = (JᵀJ)_jj
//! ```
//!
//! by stacking `sqrt(λ d_j)` rows under the Jacobian and handing the tall
//! system to the SVD least-squares routine. The trial point `p + δ` is then
//! clamped into the bound box. Steps that lower the SSE are accepted and relax
//! the damping; rejected steps tighten it.
//!
//! Convergence:
//! - the SSE is exactly zero (noiseless data)
//! - an accepted step reduced the SSE by a relative amount `<= ftol`
//! - the applied (clamped) step is `<= xtol * (‖p‖ + xtol)`
//!
//! The solver is deterministic: the same inputs always take the same path.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::domain::SolverOptions;
use crate::error::AppError;
use crate::fit::Bounds;
use crate::math::solve_least_squares;
use crate::models::DecayModel;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// A converged solve from one start.
#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

/// Minimize the SSE of `model` against `(xs, ys)` starting at `start`.
///
/// `start` must already lie inside `bounds` (see [`Bounds::validate`]).
pub fn minimize(
    model: DecayModel,
    xs: &[f64],
    ys: &[f64],
    start: &[f64],
    bounds: &Bounds,
    opts: &SolverOptions,
) -> Result<LmOutcome, AppError> {
    let n = xs.len();
    let p = model.param_count();

    let mut params = DVector::from_column_slice(start);
    let mut residuals = residual_vector(model, xs, ys, params.as_slice());
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(AppError::convergence(format!(
            "Residuals are not finite at the initial guess {start:?}."
        )));
    }

    let mut jac = jacobian(model, xs, params.as_slice());
    let mut lambda = LAMBDA_INIT;

    for iteration in 1..=opts.max_iter {
        if sse == 0.0 {
            return Ok(outcome(&params, sse, iteration - 1));
        }

        // Marquardt scaling; keep vanished columns damped instead of free.
        let diag: Vec<f64> = (0..p).map(|j| jac.column(j).norm_squared()).collect();
        let diag_max = diag.iter().copied().fold(0.0_f64, f64::max);
        let floor = (diag_max * 1e-12).max(f64::MIN_POSITIVE);

        let mut a = DMatrix::<f64>::zeros(n + p, p);
        a.view_mut((0, 0), (n, p)).copy_from(&jac);
        for j in 0..p {
            a[(n + j, j)] = (lambda * diag[j].max(floor)).sqrt();
        }
        let mut rhs = DVector::<f64>::zeros(n + p);
        rhs.rows_mut(0, n).copy_from(&(-&residuals));

        let Some(delta) = solve_least_squares(&a, &rhs) else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        };

        let trial = bounds.project(&(&params + &delta));
        let step = (&trial - &params).norm();
        let small_step = step <= opts.xtol * (params.norm() + opts.xtol);

        let trial_residuals = residual_vector(model, xs, ys, trial.as_slice());
        let trial_sse = trial_residuals.norm_squared();

        trace!(iteration, lambda, sse, trial_sse, step, "lm trial step");

        if trial_sse.is_finite() && trial_sse < sse {
            let reduction = (sse - trial_sse) / sse;
            params = trial;
            residuals = trial_residuals;
            sse = trial_sse;
            lambda = (lambda / 10.0).max(LAMBDA_MIN);

            if reduction <= opts.ftol || small_step {
                return Ok(outcome(&params, sse, iteration));
            }
            jac = jacobian(model, xs, params.as_slice());
            continue;
        }

        // No improvement possible at this resolution: we are at a (bounded) minimum.
        if small_step {
            return Ok(outcome(&params, sse, iteration));
        }

        lambda *= 10.0;
        if lambda > LAMBDA_MAX {
            break;
        }
    }

    Err(AppError::convergence(format!(
        "Solver did not converge (max_iter={}, lambda={lambda:.1e}, params={:?}, sse={sse:.6e}).",
        opts.max_iter,
        params.as_slice()
    )))
}

/// `model(x_i) - y_i` for every sample.
pub fn residual_vector(model: DecayModel, xs: &[f64], ys: &[f64], params: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        xs.len(),
        xs.iter().zip(ys).map(|(&x, &y)| model.predict(x, params) - y),
    )
}

/// Analytic Jacobian of the residuals (`n × p`).
pub fn jacobian(model: DecayModel, xs: &[f64], params: &[f64]) -> DMatrix<f64> {
    let p = model.param_count();
    let mut jac = DMatrix::<f64>::zeros(xs.len(), p);
    let mut row = vec![0.0; p];
    for (i, &x) in xs.iter().enumerate() {
        model.fill_gradient_row(x, params, &mut row);
        for j in 0..p {
            jac[(i, j)] = row[j];
        }
    }
    jac
}

fn outcome(params: &DVector<f64>, sse: f64, iterations: usize) -> LmOutcome {
    LmOutcome {
        params: params.iter().copied().collect(),
        sse,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SpaceModel, intensity_time};

    fn opts() -> SolverOptions {
        SolverOptions::default()
    }

    #[test]
    fn recovers_noiseless_time_curve() {
        let t: Vec<f64> = (0..=20).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = t.iter().map(|&t| intensity_time(t, 0.3, 80.0, 4.0)).collect();
        let bounds = Bounds::new(vec![0.001, 0.0, 0.0], vec![1.0, 200.0, 20.0]);

        let out = minimize(DecayModel::Time, &t, &y, &[0.05, 70.0, 5.0], &bounds, &opts()).unwrap();
        assert!((out.params[0] - 0.3).abs() < 1e-6, "{:?}", out.params);
        assert!((out.params[1] - 80.0).abs() < 1e-4);
        assert!((out.params[2] - 4.0).abs() < 1e-4);
        assert!(out.sse < 1e-12);
    }

    #[test]
    fn stops_on_the_bound_when_optimum_lies_outside() {
        // True B = 2 but the box caps B at 1.
        let t: Vec<f64> = (0..=10).map(|i| i as f64 * 0.3).collect();
        let y: Vec<f64> = t.iter().map(|&t| intensity_time(t, 2.0, 10.0, 1.0)).collect();
        let bounds = Bounds::new(vec![0.001, 0.0, 0.0], vec![1.0, 20.0, 3.0]);

        let out = minimize(DecayModel::Time, &t, &y, &[0.05, 9.0, 1.0], &bounds, &opts()).unwrap();
        assert!(bounds.contains(&out.params));
        assert!(out.params[0] > 0.99, "{:?}", out.params);
    }

    #[test]
    fn exhausting_the_iteration_budget_is_a_convergence_error() {
        let x: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let model = SpaceModel::new(0.2);
        let y: Vec<f64> = x.iter().map(|&x| model.intensity(x, 3.0, 50.0, 5.0)).collect();
        let bounds = Bounds::new(vec![0.01, 0.0, 0.0], vec![100.0, 60.0, 60.0]);
        let tight = SolverOptions { max_iter: 1, ..SolverOptions::default() };

        let err = minimize(DecayModel::Space(model), &x, &y, &[1.0, 30.0, 10.0], &bounds, &tight)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FitConvergence);
    }

    #[test]
    fn zero_residual_start_returns_immediately() {
        let t = [0.0, 1.0, 2.0];
        let y = [5.0, 5.0, 5.0];
        let bounds = Bounds::new(vec![0.001, 0.0, 0.0], vec![1.0, 10.0, 15.0]);

        let out = minimize(DecayModel::Time, &t, &y, &[0.05, 0.0, 5.0], &bounds, &opts()).unwrap();
        assert_eq!(out.iterations, 0);
        assert_eq!(out.params, vec![0.05, 0.0, 5.0]);
    }
}
