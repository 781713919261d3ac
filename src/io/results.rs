//! Read/write results JSON files.
//!
//! A results file is the portable record of one run:
//! - both fits (parameters, standard errors, diagnostics, space policy)
//! - the samples that were fitted
//! - precomputed fitted grids for quick re-plotting
//!
//! The schema is defined by `domain::ResultsFile`.

use std::fs::File;
use std::path::Path;

use tracing::info;

use crate::domain::{CurveGrid, FitReport, ResultsFile, SampleSet};
use crate::error::AppError;
use crate::fit::range_of;
use crate::math::lin_space;
use crate::models::{intensity_space, intensity_time};

/// Points per fitted grid.
pub const GRID_POINTS: usize = 101;

/// Build the [`ResultsFile`] for one run.
pub fn build_results(samples: &SampleSet, report: &FitReport) -> ResultsFile {
    let (time_curve, space_curve) = fitted_grids(samples, report, GRID_POINTS);
    ResultsFile {
        tool: "decay".to_string(),
        report: *report,
        samples: samples.clone(),
        time_curve,
        space_curve,
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, samples: &SampleSet, report: &FitReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create results JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &build_results(samples, report))
        .map_err(|e| AppError::io(format!("Failed to write results JSON: {e}")))?;

    info!(path = %path.display(), "results written");
    Ok(())
}

/// Read a results JSON file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile = serde_json::from_reader(file)
        .map_err(|e| AppError::invalid_input(format!("Invalid results JSON: {e}")))?;
    Ok(results)
}

/// Sample both fitted curves on `n` evenly spaced points across their data ranges.
pub fn fitted_grids(samples: &SampleSet, report: &FitReport, n: usize) -> (CurveGrid, CurveGrid) {
    let time = &report.time;
    let space = &report.space;
    let time_curve = build_grid(&samples.t, n, |t| intensity_time(t, time.b, time.io, time.ib));
    let space_curve = build_grid(&samples.x, n, |x| intensity_space(x, space.d, space.io, space.ib, space.b));
    (time_curve, space_curve)
}

fn build_grid(axis: &[f64], n: usize, f: impl Fn(f64) -> f64) -> CurveGrid {
    let (mut x0, mut x1) = range_of(axis);
    if !(x0.is_finite() && x1.is_finite()) {
        x0 = 0.0;
        x1 = 1.0;
    }
    if x1 - x0 < 1e-12 {
        x1 = x0 + 1.0;
    }

    let x = lin_space(x0, x1, n.max(2));
    let y = x.iter().map(|&v| f(v)).collect();
    CurveGrid { x, y }
}
