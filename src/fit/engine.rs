//! Two-stage orchestration: time fit, then space fit against the fitted `B`.

use tracing::{info, warn};

use crate::domain::{FitReport, SampleSet, SolverOptions, SpacePolicy};
use crate::error::AppError;
use crate::fit::{fit_space, fit_space_pinned, fit_time};

/// Consumer of finished fits (console report, plots, terminal UI).
///
/// Presentation is cosmetic: a failing presenter never invalidates the fit.
pub trait Presenter {
    fn present(&mut self, samples: &SampleSet, report: &FitReport) -> Result<(), AppError>;
}

/// Fits both stages for one sample set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitEngine {
    pub policy: SpacePolicy,
    pub solver: SolverOptions,
}

impl FitEngine {
    pub fn new(policy: SpacePolicy, solver: SolverOptions) -> Self {
        Self { policy, solver }
    }

    /// Run the time fit, then the space fit with the fitted `B`.
    pub fn fit(&self, samples: &SampleSet) -> Result<FitReport, AppError> {
        let time = fit_time(&samples.t, &samples.it, &self.solver)?;
        info!(b = time.b, io = time.io, ib = time.ib, "time curve fitted");

        let space = match self.policy {
            SpacePolicy::Free => fit_space(&samples.x, &samples.ix, time.b, &self.solver)?,
            SpacePolicy::Pinned => fit_space_pinned(&samples.x, &samples.ix, &time, &self.solver)?,
        };
        info!(d = space.d, io = space.io, ib = space.ib, policy = ?self.policy, "space curve fitted");

        Ok(FitReport { time, space })
    }

    /// [`FitEngine::fit`], then hand the result to `presenter` when `show` is set.
    pub fn run(
        &self,
        samples: &SampleSet,
        show: bool,
        presenter: &mut dyn Presenter,
    ) -> Result<FitReport, AppError> {
        let report = self.fit(samples)?;
        if show {
            if let Err(e) = presenter.present(samples, &report) {
                warn!(error = %e, "presentation failed; fit results are unaffected");
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleSpec, generate_sample};

    struct Recorder {
        calls: usize,
        fail: bool,
    }

    impl Presenter for Recorder {
        fn present(&mut self, _samples: &SampleSet, _report: &FitReport) -> Result<(), AppError> {
            self.calls += 1;
            if self.fail {
                Err(AppError::io("display unavailable"))
            } else {
                Ok(())
            }
        }
    }

    fn samples() -> SampleSet {
        generate_sample(&SampleSpec { noise: 0.0, ..SampleSpec::default() }).unwrap()
    }

    #[test]
    fn run_returns_all_six_parameters() {
        let spec = SampleSpec { noise: 0.0, ..SampleSpec::default() };
        let engine = FitEngine::default();
        let mut rec = Recorder { calls: 0, fail: false };

        let report = engine.run(&samples(), false, &mut rec).unwrap();
        let (b, io_t, ib_t, d, io_x, ib_x) = report.as_tuple();
        assert!((b - spec.b).abs() < 1e-6);
        assert!((io_t - spec.io_t).abs() < 1e-4);
        assert!((ib_t - spec.ib_t).abs() < 1e-4);
        assert!((d - spec.d).abs() < 1e-4);
        assert!((io_x - spec.io_x).abs() < 1e-4);
        assert!((ib_x - spec.ib_x).abs() < 1e-4);
        assert_eq!(rec.calls, 0);
    }

    #[test]
    fn presenter_failure_does_not_mask_results() {
        let engine = FitEngine::default();
        let mut rec = Recorder { calls: 0, fail: true };

        let report = engine.run(&samples(), true, &mut rec).unwrap();
        assert_eq!(rec.calls, 1);
        assert!(report.space.d > 0.0);
    }

    #[test]
    fn pinned_policy_repeats_the_time_pair() {
        let spec = SampleSpec { noise: 0.0, io_x: 100.0, ib_x: 10.0, ..SampleSpec::default() };
        let s = generate_sample(&spec).unwrap();
        let engine = FitEngine::new(SpacePolicy::Pinned, SolverOptions::default());

        let report = engine.fit(&s).unwrap();
        let (_, io_t, ib_t, d, io_x, ib_x) = report.as_tuple();
        assert_eq!(io_t, io_x);
        assert_eq!(ib_t, ib_x);
        assert!((d - spec.d).abs() < 1e-3, "D={d}");
        assert_eq!(report.policy(), SpacePolicy::Pinned);
    }

    #[test]
    fn time_failure_stops_before_space_fit() {
        let mut s = samples();
        s.it.pop();
        let err = FitEngine::default().fit(&s).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
        assert!(err.message().contains("It"));
    }
}
