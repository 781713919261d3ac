//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line
//!
//! The time and space curves are drawn as two panels next to each other.

use crate::domain::{CurveGrid, FitReport, ResultsFile, SampleSet};
use crate::io::fitted_grids;

pub const TIME_TITLE: &str = "I(t) = Io e^(-Bt) + Ib";
pub const SPACE_TITLE: &str = "I(x) = Io e^(-x sqrt(B/D)) + Ib";

const PANEL_GAP: &str = "   ";

/// One titled plot: observed points plus a fitted curve.
#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
    pub legend: String,
}

/// Render both fits for an in-memory run.
pub fn render_side_by_side(samples: &SampleSet, report: &FitReport, width: usize, height: usize) -> String {
    let (time_curve, space_curve) = fitted_grids(samples, report, width.max(2));
    render_panels(samples, report, &time_curve, &space_curve, width, height)
}

/// Render a saved results file using its precomputed grids.
pub fn render_results_file(results: &ResultsFile, width: usize, height: usize) -> String {
    render_panels(
        &results.samples,
        &results.report,
        &results.time_curve,
        &results.space_curve,
        width,
        height,
    )
}

/// Build the time and space panels.
pub fn build_panels(samples: &SampleSet, report: &FitReport, time_curve: &CurveGrid, space_curve: &CurveGrid) -> (Panel, Panel) {
    let time = &report.time;
    let space = &report.space;

    let left = Panel {
        title: TIME_TITLE.to_string(),
        x_label: "Time [s]".to_string(),
        y_label: "I(t)".to_string(),
        points: zip_xy(&samples.t, &samples.it),
        curve: zip_xy(&time_curve.x, &time_curve.y),
        legend: format!("o data  - fit B={:.3} Io={:.3} Ib={:.3}", time.b, time.io, time.ib),
    };
    let right = Panel {
        title: SPACE_TITLE.to_string(),
        x_label: "Distance [µm²]".to_string(),
        y_label: "I(x)".to_string(),
        points: zip_xy(&samples.x, &samples.ix),
        curve: zip_xy(&space_curve.x, &space_curve.y),
        legend: format!("o data  - fit D={:.3} Io={:.3} Ib={:.3}", space.d, space.io, space.ib),
    };
    (left, right)
}

fn render_panels(
    samples: &SampleSet,
    report: &FitReport,
    time_curve: &CurveGrid,
    space_curve: &CurveGrid,
    width: usize,
    height: usize,
) -> String {
    let (left, right) = build_panels(samples, report, time_curve, space_curve);
    let left = render_panel(&left, width, height);
    let right = render_panel(&right, width, height);

    let mut out = String::new();
    for (l, r) in left.iter().zip(right.iter()) {
        let row = format!("{l}{PANEL_GAP}{r}");
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

/// Render one panel as lines of equal character width.
///
/// Layout: title, y label with range, `height` grid rows, x label with range,
/// legend.
pub fn render_panel(panel: &Panel, width: usize, height: usize) -> Vec<String> {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = range(panel.points.iter().chain(panel.curve.iter()).map(|p| p.0)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = range(panel.points.iter().chain(panel.curve.iter()).map(|p| p.1)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    draw_curve(&mut grid, &panel.curve, x_min, x_max, y_min, y_max);

    for &(x, y) in &panel.points {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    let mut lines = Vec::with_capacity(height + 4);
    lines.push(panel.title.clone());
    lines.push(format!("{} [{y_min:.2}, {y_max:.2}]", panel.y_label));
    lines.extend(grid.into_iter().map(|row| row.into_iter().collect::<String>()));
    lines.push(format!("{} [{x_min:.2}, {x_max:.2}]", panel.x_label));
    lines.push(panel.legend.clone());

    let panel_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(width);
    lines
        .into_iter()
        .map(|l| {
            let pad = panel_width - l.chars().count();
            format!("{l}{}", " ".repeat(pad))
        })
        .collect()
}

fn zip_xy(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter().zip(y.iter()).map(|(&x, &y)| (x, y)).collect()
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
