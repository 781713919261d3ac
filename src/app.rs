//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the tracing subscriber
//! - builds a `FitConfig` (flags over environment over defaults)
//! - runs the fit pipeline, or re-plots a saved results file

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, DemoArgs, FitArgs, OutputArgs, PlotArgs, SolverArgs, TuiArgs};
use crate::data::SampleSpec;
use crate::domain::{DisplayMode, FitConfig, InputSource, SolverOptions};
use crate::error::AppError;

pub mod pipeline;

pub const ENV_MAX_ITER: &str = "DECAY_MAX_ITER";
pub const ENV_FTOL: &str = "DECAY_FTOL";
pub const ENV_XTOL: &str = "DECAY_XTOL";
pub const ENV_STARTS: &str = "DECAY_STARTS";

/// Entry point for the `decay` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(fit_config_from_args(&args)?),
        Command::Demo(args) => handle_fit(demo_config_from_args(&args)?),
        Command::Plot(args) => handle_plot(args),
        Command::Tui(args) => handle_tui(args),
    }
}

/// Logs go to stderr so stdout stays reserved for reports.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(config: FitConfig) -> Result<(), AppError> {
    let run = pipeline::run_fit(&config)?;

    if config.display == DisplayMode::Quiet {
        println!("{}", crate::report::format_tuple_line(&run.report));
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let results = crate::io::read_results_json(&args.results)?;
    let plot = crate::plot::render_results_file(&results, args.width, args.height);
    println!("{}", crate::report::format_fit_report(&results.samples, &results.report));
    println!("{plot}");
    Ok(())
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    let results = crate::io::read_results_json(&args.results)?;
    crate::tui::run(&results.samples, &results.report, &results.time_curve, &results.space_curve)
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        input: InputSource::Csv {
            time: args.time.clone(),
            space: args.space.clone(),
        },
        policy: args.solver.policy,
        solver: resolve_solver(&args.solver, solver_options_from_env()?)?,
        display: display_from_args(&args.output),
        export: args.output.export.clone(),
    })
}

pub fn demo_config_from_args(args: &DemoArgs) -> Result<FitConfig, AppError> {
    let spec = SampleSpec {
        b: args.b,
        io_t: args.io_t,
        ib_t: args.ib_t,
        d: args.d,
        io_x: args.io_x,
        ib_x: args.ib_x,
        t_max: args.t_max,
        n_t: args.n_t,
        x_max: args.x_max,
        n_x: args.n_x,
        noise: args.noise,
        seed: args.seed,
    };
    Ok(FitConfig {
        input: InputSource::Synthetic(spec),
        policy: args.solver.policy,
        solver: resolve_solver(&args.solver, solver_options_from_env()?)?,
        display: display_from_args(&args.output),
        export: args.output.export.clone(),
    })
}

fn display_from_args(args: &OutputArgs) -> DisplayMode {
    if args.tui {
        DisplayMode::Tui
    } else if args.show {
        DisplayMode::Console {
            width: args.width,
            height: args.height,
        }
    } else {
        DisplayMode::Quiet
    }
}

/// Solver options from `DECAY_*` environment variables over the defaults.
pub fn solver_options_from_env() -> Result<SolverOptions, AppError> {
    solver_options_from_lookup(|key| std::env::var(key).ok())
}

fn solver_options_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<SolverOptions, AppError> {
    let mut opts = SolverOptions::default();
    if let Some(v) = parse_env(&lookup, ENV_MAX_ITER)? {
        opts.max_iter = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_FTOL)? {
        opts.ftol = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_XTOL)? {
        opts.xtol = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_STARTS)? {
        opts.starts = v;
    }
    Ok(opts)
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::invalid_input(format!("{key}: cannot parse '{raw}'."))),
    }
}

/// Apply CLI overrides to `base` and validate the result.
fn resolve_solver(args: &SolverArgs, base: SolverOptions) -> Result<SolverOptions, AppError> {
    let opts = SolverOptions {
        max_iter: args.max_iter.unwrap_or(base.max_iter),
        ftol: args.ftol.unwrap_or(base.ftol),
        xtol: args.xtol.unwrap_or(base.xtol),
        starts: args.starts.unwrap_or(base.starts),
    };

    if opts.max_iter == 0 {
        return Err(AppError::invalid_input("max_iter must be at least 1."));
    }
    if opts.starts == 0 {
        return Err(AppError::invalid_input("starts must be at least 1."));
    }
    for (name, v) in [("ftol", opts.ftol), ("xtol", opts.xtol)] {
        if !(v.is_finite() && v >= 0.0) {
            return Err(AppError::invalid_input(format!("{name} must be a finite, non-negative number (got {v}).")));
        }
    }
    Ok(opts)
}
