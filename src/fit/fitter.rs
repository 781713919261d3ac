//! Fitting routines for the two stages.
//!
//! Given measured samples we:
//! - validate the series (non-empty, equal length, finite)
//! - derive the initial guess and the bound box from the data
//! - run the bounded solver from every start (parallel)
//! - keep the lowest-SSE outcome and estimate parameter standard errors
//!
//! The space stage takes the time-stage `B` as an explicit input.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{FitQuality, SolverOptions, SpaceFit, SpacePolicy, TimeFit};
use crate::error::AppError;
use crate::fit::{Bounds, LmOutcome, jacobian, minimize, range_of, start_grid};
use crate::math::normal_matrix_inverse;
use crate::models::{DecayModel, SpaceModel};

/// Initial guess for the time-fit decay rate `B`.
pub const B_GUESS: f64 = 0.05;
/// Initial guess for the diffusion coefficient `D`.
pub const D_GUESS: f64 = 1.0;

/// Best solve for one stage, with diagnostics.
#[derive(Debug, Clone)]
pub struct CurveSolution {
    pub params: Vec<f64>,
    pub std_err: Vec<f64>,
    pub quality: FitQuality,
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    outcome: LmOutcome,
}

/// Validate an `(x, y)` pair before any solver work.
pub fn validate_series(x_name: &str, xs: &[f64], y_name: &str, ys: &[f64]) -> Result<(), AppError> {
    if xs.is_empty() || ys.is_empty() {
        return Err(AppError::invalid_input(format!(
            "Empty input: len({x_name})={}, len({y_name})={}.",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() != ys.len() {
        return Err(AppError::invalid_input(format!(
            "Length mismatch: len({x_name})={} but len({y_name})={}.",
            xs.len(),
            ys.len()
        )));
    }
    for (name, values) in [(x_name, xs), (y_name, ys)] {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(AppError::invalid_input(format!(
                "Non-finite value in {name} at index {i}: {}.",
                values[i]
            )));
        }
    }
    Ok(())
}

/// Fit `I(t) = Io * exp(-B t) + Ib` to the time series.
///
/// Guess: `B = 0.05`, `Io = range(It)`, `Ib = min(It)`.
/// Bounds: see [`Bounds::for_time`].
pub fn fit_time(t: &[f64], it: &[f64], opts: &SolverOptions) -> Result<TimeFit, AppError> {
    validate_series("t", t, "It", it)?;

    let (min, max) = range_of(it);
    let guess = vec![B_GUESS, max - min, min];
    let bounds = Bounds::for_time(it);

    let sol = fit_curve(DecayModel::Time, t, it, guess, &bounds, opts)?;
    debug!(b = sol.params[0], io = sol.params[1], ib = sol.params[2], sse = sol.quality.sse, "time fit");

    Ok(TimeFit {
        b: sol.params[0],
        io: sol.params[1],
        ib: sol.params[2],
        std_err: [sol.std_err[0], sol.std_err[1], sol.std_err[2]],
        quality: sol.quality,
    })
}

/// Fit `I(x) = Io * exp(-x sqrt(B/D)) + Ib` to the space series, refitting
/// `D`, `Io` and `Ib` ([`SpacePolicy::Free`]).
///
/// Guess: `D = 1`, `Io = range(Ix)`, `Ib = min(Ix)`.
/// Bounds: see [`Bounds::for_space`].
pub fn fit_space(x: &[f64], ix: &[f64], b: f64, opts: &SolverOptions) -> Result<SpaceFit, AppError> {
    validate_series("x", x, "Ix", ix)?;
    let model = space_model(b)?;

    let (min, max) = range_of(ix);
    let guess = vec![D_GUESS, max - min, min];
    let bounds = Bounds::for_space(ix);

    let sol = fit_curve(DecayModel::Space(model), x, ix, guess, &bounds, opts)?;
    let d = ensure_positive_d(sol.params[0])?;
    debug!(d, io = sol.params[1], ib = sol.params[2], sse = sol.quality.sse, "space fit (free)");

    Ok(SpaceFit {
        d,
        io: sol.params[1],
        ib: sol.params[2],
        b,
        policy: SpacePolicy::Free,
        d_err: sol.std_err[0],
        io_err: Some(sol.std_err[1]),
        ib_err: Some(sol.std_err[2]),
        quality: sol.quality,
    })
}

/// Fit `D` only, reusing the time fit's `Io`/`Ib` ([`SpacePolicy::Pinned`]).
///
/// Guess: `D = 1`. Bounds: `D ∈ [1e-12, ∞)`.
pub fn fit_space_pinned(
    x: &[f64],
    ix: &[f64],
    time: &TimeFit,
    opts: &SolverOptions,
) -> Result<SpaceFit, AppError> {
    validate_series("x", x, "Ix", ix)?;
    let model = space_model(time.b)?;

    let pinned = DecayModel::SpacePinned { model, io: time.io, ib: time.ib };
    let sol = fit_curve(pinned, x, ix, vec![D_GUESS], &Bounds::for_space_pinned(), opts)?;
    let d = ensure_positive_d(sol.params[0])?;
    debug!(d, sse = sol.quality.sse, "space fit (pinned)");

    Ok(SpaceFit {
        d,
        io: time.io,
        ib: time.ib,
        b: time.b,
        policy: SpacePolicy::Pinned,
        d_err: sol.std_err[0],
        io_err: None,
        ib_err: None,
        quality: sol.quality,
    })
}

/// Solve one stage from every start and keep the best outcome.
pub fn fit_curve(
    model: DecayModel,
    xs: &[f64],
    ys: &[f64],
    guess: Vec<f64>,
    bounds: &Bounds,
    opts: &SolverOptions,
) -> Result<CurveSolution, AppError> {
    bounds.validate(model.param_names(), &guess)?;
    let starts = start_grid(&guess, bounds, opts.starts)?;

    // Evaluate each start independently (parallel).
    let results: Vec<(usize, Result<LmOutcome, AppError>)> = starts
        .par_iter()
        .enumerate()
        .map(|(idx, start)| (idx, minimize(model, xs, ys, start, bounds, opts)))
        .collect();

    let mut first_err = None;
    let mut candidates = Vec::with_capacity(results.len());
    for (idx, res) in results {
        match res {
            Ok(outcome) => candidates.push(Candidate { idx, outcome }),
            Err(e) => {
                debug!(start = idx, error = %e, "start failed");
                if idx == 0 {
                    first_err = Some(e);
                }
            }
        }
    }

    // Deterministic selection: pick the minimum SSE; break ties by start index.
    let Some(best) = candidates.iter().reduce(|best, c| {
        if c.outcome.sse < best.outcome.sse
            || (c.outcome.sse == best.outcome.sse && c.idx < best.idx)
        {
            c
        } else {
            best
        }
    }) else {
        return Err(first_err.unwrap_or_else(|| {
            AppError::convergence("No start converged.")
        }));
    };

    let n = xs.len();
    let p = model.param_count();
    let params = best.outcome.params.clone();
    let sse = best.outcome.sse;

    let std_err = standard_errors(model, xs, &params, sse)?;
    let quality = FitQuality {
        sse,
        rmse: (sse / n as f64).sqrt(),
        r_squared: r_squared(ys, sse),
        n,
        iterations: best.outcome.iterations,
        start: best.idx,
    };
    debug!(start = best.idx, n, p, sse, "selected start");

    Ok(CurveSolution { params, std_err, quality })
}

/// 1-sigma errors from `s² (JᵀJ)⁻¹` with `s² = SSE / max(n - p, 1)`.
fn standard_errors(model: DecayModel, xs: &[f64], params: &[f64], sse: f64) -> Result<Vec<f64>, AppError> {
    let jac = jacobian(model, xs, params);
    let Some(inv) = normal_matrix_inverse(&jac) else {
        return Err(AppError::convergence(format!(
            "Covariance of the parameters could not be estimated (singular Jacobian at {params:?})."
        )));
    };

    let dof = xs.len().saturating_sub(model.param_count()).max(1) as f64;
    let s2 = sse / dof;
    let errs: Vec<f64> = (0..model.param_count()).map(|j| (s2 * inv[(j, j)]).sqrt()).collect();
    if errs.iter().any(|e| !e.is_finite()) {
        return Err(AppError::convergence("Covariance of the parameters is not finite."));
    }
    Ok(errs)
}

fn r_squared(ys: &[f64], sse: f64) -> f64 {
    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let sst: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
    // Flat data has no variance to explain; report a perfect fit as 1 and anything else as 0.
    if sst > 0.0 {
        1.0 - sse / sst
    } else if sse == 0.0 {
        1.0
    } else {
        0.0
    }
}

fn space_model(b: f64) -> Result<SpaceModel, AppError> {
    if !(b.is_finite() && b > 0.0) {
        return Err(AppError::invalid_input(format!(
            "Space fit needs a positive, finite decay rate B (got {b})."
        )));
    }
    Ok(SpaceModel::new(b))
}

fn ensure_positive_d(d: f64) -> Result<f64, AppError> {
    if d.is_finite() && d > 0.0 {
        Ok(d)
    } else {
        Err(AppError::convergence(format!(
            "Invariant violated: fitted D must be positive and finite (got {d})."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleSpec, generate_sample};
    use crate::error::ErrorKind;
    use crate::fit::{B_MAX, B_MIN};
    use crate::models::{intensity_space, intensity_time};

    fn opts() -> SolverOptions {
        SolverOptions::default()
    }

    fn rel_err(got: f64, want: f64) -> f64 {
        ((got - want) / want).abs()
    }

    #[test]
    fn time_scenario_recovers_known_parameters() {
        let t: [f64; 6] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let it: Vec<f64> = t.iter().map(|&t| 100.0 * (-0.2 * t).exp() + 10.0).collect();

        let fit = fit_time(&t, &it, &opts()).unwrap();
        assert!((fit.b - 0.2).abs() < 1e-3, "B={}", fit.b);
        assert!((fit.io - 100.0).abs() < 1e-3, "Io={}", fit.io);
        assert!((fit.ib - 10.0).abs() < 1e-3, "Ib={}", fit.ib);
    }

    #[test]
    fn space_scenario_recovers_d() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let ix: Vec<f64> = x
            .iter()
            .map(|&x| 50.0 * (-x * (0.2_f64 / 3.0).sqrt()).exp() + 5.0)
            .collect();

        let fit = fit_space(&x, &ix, 0.2, &opts()).unwrap();
        assert!((fit.d - 3.0).abs() < 1e-2, "D={}", fit.d);
        assert_eq!(fit.policy, SpacePolicy::Free);
    }

    #[test]
    fn time_scenario_holds_for_any_start_count() {
        let t: [f64; 6] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let it: Vec<f64> = t.iter().map(|&t| 100.0 * (-0.2 * t).exp() + 10.0).collect();

        for starts in 1..=4 {
            let fit = fit_time(&t, &it, &SolverOptions { starts, ..opts() }).unwrap();
            assert!((fit.b - 0.2).abs() < 1e-3, "starts={starts} B={}", fit.b);
            assert!((fit.io - 100.0).abs() < 1e-3, "starts={starts} Io={}", fit.io);
            assert!((fit.ib - 10.0).abs() < 1e-3, "starts={starts} Ib={}", fit.ib);
        }
    }

    #[test]
    fn space_fit_works_with_two_starts() {
        let x: Vec<f64> = (0..=40).map(|i| i as f64 * 0.5).collect();
        let ix: Vec<f64> = x.iter().map(|&x| intensity_space(x, 3.0, 50.0, 5.0, 0.2)).collect();
        let two = SolverOptions { starts: 2, ..opts() };

        let fit = fit_space(&x, &ix, 0.2, &two).unwrap();
        assert!(rel_err(fit.d, 3.0) < 1e-4, "D={}", fit.d);

        let time = TimeFit {
            b: 0.2,
            io: 50.0,
            ib: 5.0,
            std_err: [0.0; 3],
            quality: FitQuality { sse: 0.0, rmse: 0.0, r_squared: 1.0, n: 0, iterations: 0, start: 0 },
        };
        let pinned = fit_space_pinned(&x, &ix, &time, &two).unwrap();
        assert!(rel_err(pinned.d, 3.0) < 1e-4, "D={}", pinned.d);
    }

    #[test]
    fn non_positive_d_is_an_invariant_violation() {
        for d in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ensure_positive_d(d).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FitConvergence);
            assert!(err.message().contains("Invariant violated"), "{err}");
        }
        assert_eq!(ensure_positive_d(2.5).unwrap(), 2.5);
    }

    #[test]
    fn time_round_trip_is_exact_for_noiseless_data() {
        let t: Vec<f64> = (0..=80).map(|i| i as f64 * 0.5).collect();
        for &(b, io, ib) in &[(0.1, 50.0, 5.0), (0.5, 200.0, 20.0), (0.05, 30.0, 2.0)] {
            let it: Vec<f64> = t.iter().map(|&t| intensity_time(t, b, io, ib)).collect();
            let fit = fit_time(&t, &it, &opts()).unwrap();
            assert!(rel_err(fit.b, b) < 1e-4, "B {} vs {b}", fit.b);
            assert!(rel_err(fit.io, io) < 1e-4, "Io {} vs {io}", fit.io);
            assert!(rel_err(fit.ib, ib) < 1e-4, "Ib {} vs {ib}", fit.ib);
        }
    }

    #[test]
    fn space_round_trip_is_exact_for_noiseless_data() {
        let x: Vec<f64> = (0..=100).map(|i| i as f64 * 0.5).collect();
        for &d in &[0.5, 3.0, 20.0] {
            let ix: Vec<f64> = x.iter().map(|&x| intensity_space(x, d, 40.0, 4.0, 0.2)).collect();
            let fit = fit_space(&x, &ix, 0.2, &opts()).unwrap();
            assert!(rel_err(fit.d, d) < 1e-4, "D {} vs {d}", fit.d);
            assert!(rel_err(fit.io, 40.0) < 1e-4);
            assert!(rel_err(fit.ib, 4.0) < 1e-4);
        }
    }

    #[test]
    fn noisy_samples_stay_within_five_percent() {
        let spec = SampleSpec {
            t_max: 30.0,
            n_t: 121,
            x_max: 40.0,
            n_x: 121,
            noise: 0.01,
            seed: 7,
            ..SampleSpec::default()
        };
        let s = generate_sample(&spec).unwrap();

        let time = fit_time(&s.t, &s.it, &opts()).unwrap();
        assert!(rel_err(time.b, spec.b) < 0.05, "B={}", time.b);
        assert!(rel_err(time.io, spec.io_t) < 0.05, "Io={}", time.io);
        assert!(rel_err(time.ib, spec.ib_t) < 0.05, "Ib={}", time.ib);

        let space = fit_space(&s.x, &s.ix, time.b, &opts()).unwrap();
        assert!(rel_err(space.d, spec.d) < 0.05, "D={}", space.d);
        assert!(rel_err(space.io, spec.io_x) < 0.05, "Io={}", space.io);
        assert!(rel_err(space.ib, spec.ib_x) < 0.05, "Ib={}", space.ib);
    }

    #[test]
    fn constant_intensity_is_a_convergence_error() {
        let t: [f64; 6] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let it = [7.5; 6];

        let err = fit_time(&t, &it, &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FitConvergence);
        assert!(err.message().contains("Covariance"), "{err}");

        // Deterministic regardless of the start grid.
        let single = SolverOptions { starts: 1, ..opts() };
        let err = fit_time(&t, &it, &single).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FitConvergence);
    }

    #[test]
    fn mismatched_lengths_fail_before_solving() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let it = [5.0, 4.0, 3.0, 2.0];
        // A zero iteration budget would make any solver call fail with a
        // convergence error, so an input error proves no solve happened.
        let no_budget = SolverOptions { max_iter: 0, ..opts() };

        let err = fit_time(&t, &it, &no_budget).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.message().contains("mismatch"));
    }

    #[test]
    fn empty_and_non_finite_inputs_are_rejected() {
        assert_eq!(fit_time(&[], &[], &opts()).unwrap_err().kind(), ErrorKind::InvalidInput);
        let err = fit_space(&[0.0, 1.0], &[1.0, f64::NAN], 0.2, &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = fit_time(&[0.0, f64::INFINITY], &[2.0, 1.0], &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn space_fit_rejects_non_positive_b() {
        let x = [0.0, 1.0, 2.0];
        let ix = [3.0, 2.0, 1.5];
        for b in [0.0, -0.1, f64::NAN] {
            let err = fit_space(&x, &ix, b, &opts()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn zero_minimum_intensity_reports_degenerate_bounds() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let it = [8.0, 4.0, 1.0, 0.0];
        let err = fit_time(&t, &it, &opts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateBounds);
    }

    #[test]
    fn fitted_parameters_respect_their_bounds() {
        for seed in 0..5 {
            // Same amplitude/baseline on both curves so the pinned policy is well posed.
            let spec = SampleSpec { seed, noise: 0.02, io_x: 100.0, ib_x: 10.0, ..SampleSpec::default() };
            let s = generate_sample(&spec).unwrap();

            let time = fit_time(&s.t, &s.it, &opts()).unwrap();
            assert!(time.b >= B_MIN && time.b <= B_MAX, "B={}", time.b);

            let space = fit_space(&s.x, &s.ix, time.b, &opts()).unwrap();
            assert!(space.d > 0.0, "D={}", space.d);

            let pinned = fit_space_pinned(&s.x, &s.ix, &time, &opts()).unwrap();
            assert!(pinned.d > 0.0, "D={}", pinned.d);
        }
    }

    #[test]
    fn pinned_policy_reuses_time_amplitude_and_baseline() {
        let x: Vec<f64> = (0..=40).map(|i| i as f64 * 0.5).collect();
        let time = TimeFit {
            b: 0.2,
            io: 50.0,
            ib: 5.0,
            std_err: [0.0; 3],
            quality: FitQuality { sse: 0.0, rmse: 0.0, r_squared: 1.0, n: 0, iterations: 0, start: 0 },
        };
        let ix: Vec<f64> = x.iter().map(|&x| intensity_space(x, 3.0, 50.0, 5.0, 0.2)).collect();

        let fit = fit_space_pinned(&x, &ix, &time, &opts()).unwrap();
        assert!(rel_err(fit.d, 3.0) < 1e-4, "D={}", fit.d);
        assert_eq!(fit.io, 50.0);
        assert_eq!(fit.ib, 5.0);
        assert_eq!(fit.policy, SpacePolicy::Pinned);
        assert!(fit.io_err.is_none());
    }
}
