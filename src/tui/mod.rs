//! Ratatui-based terminal viewer.
//!
//! Shows the time and space fits as two Plotters charts side by side, with the
//! fitted parameters in the header.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::domain::{CurveGrid, FitReport, SampleSet};
use crate::error::AppError;
use crate::fit::Presenter;
use crate::io::fitted_grids;
use crate::plot::{Panel, build_panels};

mod plotters_chart;

use plotters_chart::DecayChart;

/// Points per fitted curve in the charts.
const CURVE_POINTS: usize = 200;

/// Presents a run in the interactive viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuiPresenter;

impl Presenter for TuiPresenter {
    fn present(&mut self, samples: &SampleSet, report: &FitReport) -> Result<(), AppError> {
        let (time_curve, space_curve) = fitted_grids(samples, report, CURVE_POINTS);
        run(samples, report, &time_curve, &space_curve)
    }
}

/// Start the viewer for one run; returns when the user quits.
pub fn run(
    samples: &SampleSet,
    report: &FitReport,
    time_curve: &CurveGrid,
    space_curve: &CurveGrid,
) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::io(format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(samples, report, time_curve, space_curve);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::io(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::io(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    report: FitReport,
    time: ChartSeries,
    space: ChartSeries,
    show_points: bool,
    show_curve: bool,
}

impl App {
    fn new(samples: &SampleSet, report: &FitReport, time_curve: &CurveGrid, space_curve: &CurveGrid) -> Self {
        let (left, right) = build_panels(samples, report, time_curve, space_curve);
        Self {
            report: *report,
            time: ChartSeries::from_panel(left),
            space: ChartSeries::from_panel(right),
            show_points: true,
            show_curve: true,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::io(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100)).map_err(|e| AppError::io(format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::io(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the viewer should close.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('p') => self.show_points = !self.show_points,
            KeyCode::Char('c') => self.show_curve = !self.show_curve,
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let time = &self.report.time;
        let space = &self.report.space;
        let gray = Style::default().fg(Color::Gray);

        let lines = vec![
            Line::from(vec![
                Span::styled("decay", Style::default().fg(Color::Cyan)),
                Span::raw(format!(" - space policy: {}", self.report.policy().display_name())),
            ]),
            Line::from(Span::styled(
                format!(
                    "time:  B={:.3} Io={:.3} Ib={:.3} | rmse={:.4} R²={:.4}",
                    time.b, time.io, time.ib, time.quality.rmse, time.quality.r_squared
                ),
                gray,
            )),
            Line::from(Span::styled(
                format!(
                    "space: D={:.3} Io={:.3} Ib={:.3} | rmse={:.4} R²={:.4}",
                    space.d, space.io, space.ib, space.quality.rmse, space.quality.r_squared
                ),
                gray,
            )),
        ];

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        self.draw_chart(frame, chunks[0], &self.time);
        self.draw_chart(frame, chunks[1], &self.space);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, series: &ChartSeries) {
        let block = Block::default().title(series.title.as_str()).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        // Last inner row holds the legend.
        let legend_rect = Rect {
            x: inner.x,
            y: inner.y + inner.height.saturating_sub(1),
            width: inner.width,
            height: inner.height.min(1),
        };
        let plot_area = Rect {
            height: inner.height.saturating_sub(1),
            ..inner
        };

        let (chart_rect, insets) = chart_layout(plot_area);
        let widget = DecayChart {
            curve: &series.curve,
            points: &series.points,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: &series.x_label,
            y_label: &series.y_label,
            show_points: self.show_points,
            show_curve: self.show_curve,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, plot_area, chart_rect, insets, series);
        }
        frame.render_widget(
            Paragraph::new(series.legend.as_str()).style(Style::default().fg(Color::Gray)),
            legend_rect,
        );
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let on_off = |b: bool| if b { "on" } else { "off" };
        let help = "p points  c curve  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(
                format!("points: {} curve: {}", on_off(self.show_points), on_off(self.show_curve)),
                Style::default().fg(Color::Yellow),
            ),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Chart-ready data for one panel.
#[derive(Debug, Clone)]
struct ChartSeries {
    title: String,
    x_label: String,
    y_label: String,
    legend: String,
    curve: Vec<(f64, f64)>,
    points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

impl ChartSeries {
    fn from_panel(panel: Panel) -> Self {
        let all = || panel.points.iter().chain(panel.curve.iter());

        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in all().filter(|(x, y)| x.is_finite() && y.is_finite()) {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        if !x_min.is_finite() || !x_max.is_finite() || x_max <= x_min {
            x_min = 0.0;
            x_max = 1.0;
        }
        if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
            y_min = 0.0;
            y_max = 1.0;
        }

        let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);

        Self {
            x_bounds: [x_min, x_max],
            y_bounds: [y_min - pad, y_max + pad],
            title: panel.title,
            x_label: panel.x_label,
            y_label: panel.y_label,
            legend: panel.legend,
            curve: panel.curve,
            points: panel.points,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, insets: AxisInsets, series: &ChartSeries) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = series.x_bounds;
    let [y0, y1] = series.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x0 + u * (x1 - x0);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = format!("{x_val:.1}");
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y0 + u * (y1 - y0);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = format!("{y_val:.0}");
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(series.x_label.as_str())
        .alignment(Alignment::Center)
        .style(style);
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(series.y_label.as_str()).style(style.add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
