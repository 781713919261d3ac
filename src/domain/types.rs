//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - reloaded later for plotting

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The four measured series of one experiment.
///
/// `t`/`it` are the time axis and the intensity of the bleached spot over
/// time; `x`/`ix` are the distance from the edge and the intensity profile
/// over space. The fit engine only ever borrows these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub t: Vec<f64>,
    pub it: Vec<f64>,
    pub x: Vec<f64>,
    pub ix: Vec<f64>,
}

impl SampleSet {
    pub fn new(t: Vec<f64>, it: Vec<f64>, x: Vec<f64>, ix: Vec<f64>) -> Self {
        Self { t, it, x, ix }
    }
}

/// How the space fit treats amplitude and baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpacePolicy {
    /// Refit `D`, `Io` and `Ib` on the space curve (bounded, 3 parameters).
    #[default]
    Free,
    /// Reuse `Io`/`Ib` from the time fit and fit `D` only.
    Pinned,
}

impl SpacePolicy {
    pub fn display_name(self) -> &'static str {
        match self {
            SpacePolicy::Free => "free (D, Io, Ib)",
            SpacePolicy::Pinned => "pinned (D; Io/Ib from time fit)",
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    pub n: usize,
    /// Solver iterations used by the winning start.
    pub iterations: usize,
    /// Index of the winning start (0 is the documented initial guess).
    pub start: usize,
}

/// Result of the time fit: `I(t) = Io * exp(-B t) + Ib`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeFit {
    /// Decay rate `B` [1/time].
    pub b: f64,
    pub io: f64,
    pub ib: f64,
    /// 1-sigma standard errors, in `(B, Io, Ib)` order.
    pub std_err: [f64; 3],
    pub quality: FitQuality,
}

impl TimeFit {
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.b, self.io, self.ib)
    }
}

/// Result of the space fit: `I(x) = Io * exp(-x sqrt(B/D)) + Ib`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceFit {
    /// Diffusion-like coefficient `D` [length²/time].
    pub d: f64,
    pub io: f64,
    pub ib: f64,
    /// The time-fit decay rate this fit was computed against.
    pub b: f64,
    pub policy: SpacePolicy,
    /// Standard error of `D`.
    pub d_err: f64,
    /// Standard errors of `Io`/`Ib`; `None` when they were not fitted here.
    pub io_err: Option<f64>,
    pub ib_err: Option<f64>,
    pub quality: FitQuality,
}

impl SpaceFit {
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.d, self.io, self.ib)
    }

    /// Spatial decay rate `sqrt(B/D)` [1/length].
    pub fn spatial_rate(&self) -> f64 {
        (self.b / self.d).sqrt()
    }
}

/// Both stages of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub time: TimeFit,
    pub space: SpaceFit,
}

impl FitReport {
    /// `(B, Io_t, Ib_t, D, Io_x, Ib_x)`.
    ///
    /// Under [`SpacePolicy::Pinned`] the second amplitude/baseline pair is the
    /// time-fit pair repeated.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64, f64, f64) {
        (
            self.time.b,
            self.time.io,
            self.time.ib,
            self.space.d,
            self.space.io,
            self.space.ib,
        )
    }

    pub fn policy(&self) -> SpacePolicy {
        self.space.policy
    }
}

/// Iterative solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Maximum number of trial steps per start.
    pub max_iter: usize,
    /// Relative SSE reduction below which an accepted step counts as converged.
    pub ftol: f64,
    /// Relative step size below which the solver counts as converged.
    pub xtol: f64,
    /// Number of starts (1 = documented initial guess only).
    pub starts: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iter: 400,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            starts: 8,
        }
    }
}

/// Where the four series come from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Two CSV files: `(t, It)` and `(x, Ix)`.
    Csv { time: PathBuf, space: PathBuf },
    /// Generated from known parameters (see `data::SampleSpec`).
    Synthetic(crate::data::SampleSpec),
}

/// How results are presented after fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// One-line parameter summary only.
    Quiet,
    /// Parameter report plus side-by-side ASCII plots.
    Console { width: usize, height: usize },
    /// Interactive terminal viewer.
    Tui,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, the environment, and defaults.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: InputSource,
    pub policy: SpacePolicy,
    pub solver: SolverOptions,
    pub display: DisplayMode,
    pub export: Option<PathBuf>,
}

/// A saved results file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub report: FitReport,
    pub samples: SampleSet,
    pub time_curve: CurveGrid,
    pub space_curve: CurveGrid,
}

/// A fitted curve sampled on a regular grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}
