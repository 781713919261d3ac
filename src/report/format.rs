//! Formatted terminal output for a finished run.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (snapshot-friendly)

use crate::domain::{FitQuality, FitReport, SampleSet};
use crate::models::{intensity_space, intensity_time};

/// Summary of the residuals `y_obs - y_fit` of one curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualStats {
    pub mean: f64,
    pub max_abs: f64,
}

/// Residual statistics for the time and space curves, in that order.
pub fn compute_residual_stats(samples: &SampleSet, report: &FitReport) -> (ResidualStats, ResidualStats) {
    let time = &report.time;
    let space = &report.space;
    let t = residual_stats(&samples.t, &samples.it, |t| intensity_time(t, time.b, time.io, time.ib));
    let x = residual_stats(&samples.x, &samples.ix, |x| {
        intensity_space(x, space.d, space.io, space.ib, space.b)
    });
    (t, x)
}

fn residual_stats(xs: &[f64], ys: &[f64], f: impl Fn(f64) -> f64) -> ResidualStats {
    let mut sum = 0.0;
    let mut max_abs: f64 = 0.0;
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let r = y - f(x);
        sum += r;
        max_abs = max_abs.max(r.abs());
    }
    let n = xs.len().min(ys.len()).max(1) as f64;
    ResidualStats { mean: sum / n, max_abs }
}

/// Format the parameter report (3 decimals) plus fit diagnostics.
pub fn format_fit_report(samples: &SampleSet, report: &FitReport) -> String {
    let time = &report.time;
    let space = &report.space;
    let (t_res, x_res) = compute_residual_stats(samples, report);

    let mut out = String::new();

    out.push_str("=== decay - two-stage exponential fit ===\n");
    out.push_str(&format!("Space policy: {}\n", report.policy().display_name()));

    out.push_str("\nIntensity equation of time:\n");
    out.push_str(&format!("Io = {:.3}\n", time.io));
    out.push_str(&format!("Ib = {:.3}\n", time.ib));
    out.push_str(&format!("B = {:.3}\n", time.b));

    out.push_str("\nIntensity equation of space:\n");
    out.push_str(&format!("Io = {:.3}\n", space.io));
    out.push_str(&format!("Ib = {:.3}\n", space.ib));
    out.push_str(&format!("D = {:.3}\n", space.d));
    out.push_str(&format!("sqrt(B/D) = {:.3}\n", space.spatial_rate()));

    out.push_str("\nDiagnostics:\n");
    out.push_str(&format_quality_line("time", &time.quality, t_res));
    out.push_str(&format_quality_line("space", &space.quality, x_res));

    out.push_str("\nStandard errors:\n");
    out.push_str(&format!(
        "time   B ± {} | Io ± {} | Ib ± {}\n",
        fmt_err(Some(time.std_err[0])),
        fmt_err(Some(time.std_err[1])),
        fmt_err(Some(time.std_err[2])),
    ));
    out.push_str(&format!(
        "space  D ± {} | Io ± {} | Ib ± {}\n",
        fmt_err(Some(space.d_err)),
        fmt_err(space.io_err),
        fmt_err(space.ib_err),
    ));

    out
}

/// One line with all six parameters, for quiet runs and scripts.
pub fn format_tuple_line(report: &FitReport) -> String {
    let (b, io_t, ib_t, d, io_x, ib_x) = report.as_tuple();
    format!("B={b:.3} Io_t={io_t:.3} Ib_t={ib_t:.3} D={d:.3} Io_x={io_x:.3} Ib_x={ib_x:.3}")
}

fn format_quality_line(label: &str, q: &FitQuality, res: ResidualStats) -> String {
    format!(
        "{label:<6} n={} SSE={:.3} RMSE={:.3} R²={:.4} mean(r)={:.3} max|r|={:.3} start={} iters={}\n",
        q.n, q.sse, q.rmse, q.r_squared, res.mean, res.max_abs, q.start, q.iterations
    )
}

fn fmt_err(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.3}"),
        None => "n/a".to_string(),
    }
}
