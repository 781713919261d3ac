//! Shared "fit pipeline" logic used by the `fit` and `demo` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load/generate samples -> time fit -> space fit -> present -> export
//!
//! The commands can then focus on argument handling.

use tracing::info;

use crate::data::generate_sample;
use crate::domain::{DisplayMode, FitConfig, FitReport, InputSource, SampleSet};
use crate::error::AppError;
use crate::fit::{FitEngine, Presenter};
use crate::io::{load_sample_set, write_results_json};
use crate::report::ConsolePresenter;
use crate::tui::TuiPresenter;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub samples: SampleSet,
    pub report: FitReport,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Samples from CSV or synthetic generation.
    let samples = load_samples(&config.input)?;
    info!(n_t = samples.t.len(), n_x = samples.x.len(), "samples ready");

    // 2) Fit both stages, presenting when a display was requested.
    let engine = FitEngine::new(config.policy, config.solver);
    let report = match presenter_for(config.display) {
        Some(mut presenter) => engine.run(&samples, true, presenter.as_mut())?,
        None => engine.fit(&samples)?,
    };

    // 3) Optional export.
    if let Some(path) = &config.export {
        write_results_json(path, &samples, &report)?;
    }

    Ok(RunOutput { samples, report })
}

/// Resolve the input source into the four sample arrays.
pub fn load_samples(input: &InputSource) -> Result<SampleSet, AppError> {
    match input {
        InputSource::Csv { time, space } => load_sample_set(time, space),
        InputSource::Synthetic(spec) => generate_sample(spec),
    }
}

fn presenter_for(display: DisplayMode) -> Option<Box<dyn Presenter>> {
    match display {
        DisplayMode::Quiet => None,
        DisplayMode::Console { width, height } => Some(Box::new(ConsolePresenter::new(width, height))),
        DisplayMode::Tui => Some(Box::new(TuiPresenter)),
    }
}
