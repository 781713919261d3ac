//! Command-line parsing for the two-stage decay fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::SpacePolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "decay", version, about = "Two-stage exponential decay fitter (time, then space)")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit measured `(t, It)` and `(x, Ix)` curves from two CSV files.
    Fit(FitArgs),
    /// Generate a synthetic experiment from known parameters and fit it.
    Demo(DemoArgs),
    /// Plot a previously exported results JSON.
    Plot(PlotArgs),
    /// Open a previously exported results JSON in the interactive viewer.
    Tui(TuiArgs),
}

/// Options for fitting measured data.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// CSV with the time curve (columns `t,It`).
    #[arg(long, value_name = "CSV")]
    pub time: PathBuf,

    /// CSV with the space curve (columns `x,Ix`).
    #[arg(long, value_name = "CSV")]
    pub space: PathBuf,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for a synthetic run.
#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// True decay rate `B` [1/s].
    #[arg(long, default_value_t = 0.2)]
    pub b: f64,

    /// True amplitude of the time curve.
    #[arg(long, default_value_t = 100.0)]
    pub io_t: f64,

    /// True baseline of the time curve.
    #[arg(long, default_value_t = 10.0)]
    pub ib_t: f64,

    /// True diffusion coefficient `D`.
    #[arg(long, default_value_t = 3.0)]
    pub d: f64,

    /// True amplitude of the space curve.
    #[arg(long, default_value_t = 50.0)]
    pub io_x: f64,

    /// True baseline of the space curve.
    #[arg(long, default_value_t = 5.0)]
    pub ib_x: f64,

    /// Last time sample (first is 0).
    #[arg(long, default_value_t = 30.0)]
    pub t_max: f64,

    /// Number of time samples.
    #[arg(long, default_value_t = 61)]
    pub n_t: usize,

    /// Last distance sample (first is 0).
    #[arg(long, default_value_t = 40.0)]
    pub x_max: f64,

    /// Number of distance samples.
    #[arg(long, default_value_t = 61)]
    pub n_x: usize,

    /// Gaussian noise as a fraction of each curve's range (0 = noiseless).
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Solver and policy options shared by `fit` and `demo`.
///
/// Unset numeric options fall back to `DECAY_*` environment variables, then to
/// built-in defaults.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// How the space fit treats amplitude and baseline.
    #[arg(long, value_enum, default_value_t = SpacePolicy::Free)]
    pub policy: SpacePolicy,

    /// Maximum solver iterations per start [env: DECAY_MAX_ITER].
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Number of solver starts; 1 uses the initial guess only [env: DECAY_STARTS].
    #[arg(long)]
    pub starts: Option<usize>,

    /// Relative SSE reduction tolerance [env: DECAY_FTOL].
    #[arg(long)]
    pub ftol: Option<f64>,

    /// Relative step size tolerance [env: DECAY_XTOL].
    #[arg(long)]
    pub xtol: Option<f64>,
}

/// Presentation and export options shared by `fit` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Print the parameter report and side-by-side ASCII plots.
    #[arg(long)]
    pub show: bool,

    /// Show the results in the interactive terminal viewer.
    #[arg(long, conflicts_with = "show")]
    pub tui: bool,

    /// Plot width per panel (columns).
    #[arg(long, default_value_t = 50)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 15)]
    pub height: usize,

    /// Export results (parameters, samples, fitted grids) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

/// Options for plotting a saved results file.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Results JSON file produced by `decay fit --export`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,

    /// Plot width per panel (columns).
    #[arg(long, default_value_t = 50)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 15)]
    pub height: usize,
}

/// Options for viewing a saved results file.
#[derive(Debug, Parser)]
pub struct TuiArgs {
    /// Results JSON file produced by `decay fit --export`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,
}
