//! Reporting utilities: the console presenter and its formatting helpers.

pub mod format;

pub use format::*;

use std::io::Write;

use crate::domain::{FitReport, SampleSet};
use crate::error::AppError;
use crate::fit::Presenter;
use crate::plot::render_side_by_side;

/// Prints the parameter report and the side-by-side ASCII plots to stdout.
#[derive(Debug, Clone, Copy)]
pub struct ConsolePresenter {
    pub width: usize,
    pub height: usize,
}

impl ConsolePresenter {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Full console output for one run.
    pub fn render(&self, samples: &SampleSet, report: &FitReport) -> String {
        let mut out = format_fit_report(samples, report);
        out.push('\n');
        out.push_str(&render_side_by_side(samples, report, self.width, self.height));
        out
    }
}

impl Presenter for ConsolePresenter {
    fn present(&mut self, samples: &SampleSet, report: &FitReport) -> Result<(), AppError> {
        let text = self.render(samples, report);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(text.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| AppError::io(format!("Failed to write report: {e}")))
    }
}
