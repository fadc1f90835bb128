//! Chart rendering with `plotters`. The output format follows the file
//! extension: `.png` gives a bitmap, anything else SVG.

use crate::error::{ConfigurationError, Error, Result};
use crate::fields::RunField;
use crate::types::{HeartRateSample, RunningWorkout};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::panic;
use std::path::Path;

pub const CHART_SIZE: (u32, u32) = (1500, 600);

const MIN_RADIUS: f64 = 3.0;
const MAX_RADIUS: f64 = 15.0;

/// Which run columns feed the Y axis, marker colour and marker size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlot {
    pub y: RunField,
    pub color: RunField,
    pub size: RunField,
}

impl Default for RunPlot {
    fn default() -> Self {
        Self {
            y: RunField::Pace,
            color: RunField::AvgHr,
            size: RunField::Distance,
        }
    }
}

impl RunPlot {
    pub fn new(y_data: &str, clr_data: &str, sz_data: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            y: RunField::numeric(y_data, "the y axis")?,
            color: RunField::numeric(clr_data, "color")?,
            size: RunField::numeric(sz_data, "marker size")?,
        })
    }

    fn title(&self) -> String {
        format!(
            "Runs: {} by date (color: {}, size: {})",
            self.y, self.color, self.size
        )
    }
}

/// One marker, with colour and size already scaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPoint {
    pub date: NaiveDate,
    pub y: f64,
    pub color: f64,
    pub size: f64,
}

/// Runs missing any of the three values are left out.
pub fn run_points(runs: &[RunningWorkout], spec: &RunPlot) -> Vec<RunPoint> {
    let rows: Vec<(NaiveDate, f64, f64, f64)> = runs
        .iter()
        .filter_map(|r| {
            let y = spec.y.value(r).filter(|v| v.is_finite())?;
            let c = spec.color.value(r).filter(|v| v.is_finite())?;
            let s = spec.size.value(r).filter(|v| v.is_finite())?;
            Some((r.date, y, c, s))
        })
        .collect();

    let skipped = runs.len() - rows.len();
    if skipped > 0 {
        tracing::debug!(skipped, "runs without values for the requested fields");
    }

    let color_range = value_range(rows.iter().map(|r| r.2));
    let size_range = value_range(rows.iter().map(|r| r.3));

    rows.into_iter()
        .map(|(date, y, c, s)| RunPoint {
            date,
            y,
            color: normalize(c, color_range),
            size: normalize(s, size_range),
        })
        .collect()
}

fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn normalize(v: f64, range: Option<(f64, f64)>) -> f64 {
    match range {
        Some((lo, hi)) if hi > lo => (v - lo) / (hi - lo),
        _ => 0.5,
    }
}

/// Blue for low values through red for high ones.
fn heat_color(t: f64) -> HSLColor {
    HSLColor((1.0 - t.clamp(0.0, 1.0)) * 0.66, 0.85, 0.45)
}

#[allow(clippy::cast_possible_truncation)]
fn radius(t: f64) -> i32 {
    (MIN_RADIUS + t.clamp(0.0, 1.0) * (MAX_RADIUS - MIN_RADIUS)).round() as i32
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - pad, hi + pad)
}

enum ChartKind {
    Png,
    Svg,
}

fn chart_kind(path: &Path) -> ChartKind {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => ChartKind::Png,
        _ => ChartKind::Svg,
    }
}

/// Backends can panic on missing fonts; turn that into an error.
fn guard(render: impl FnOnce() -> anyhow::Result<()>) -> Result<()> {
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| Error::Plot("plotting backend panicked".to_string()))?
        .map_err(|e| Error::Plot(format!("{e:#}")))
}

pub fn render_runs(runs: &[RunningWorkout], spec: &RunPlot, out: &Path) -> Result<()> {
    let points = run_points(runs, spec);
    if points.is_empty() {
        return Err(Error::Plot(format!(
            "no run has values for {}, {} and {}",
            spec.y, spec.color, spec.size
        )));
    }

    guard(|| match chart_kind(out) {
        ChartKind::Png => draw_runs(
            BitMapBackend::new(out, CHART_SIZE).into_drawing_area(),
            &points,
            spec,
        ),
        ChartKind::Svg => draw_runs(
            SVGBackend::new(out, CHART_SIZE).into_drawing_area(),
            &points,
            spec,
        ),
    })?;

    tracing::info!(path = %out.display(), points = points.len(), "run chart written");
    Ok(())
}

fn draw_runs<DB>(
    root: DrawingArea<DB, Shift>,
    points: &[RunPoint],
    spec: &RunPlot,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    // Pace is drawn negated so that faster runs sit higher.
    let sign = if spec.y.reversed_axis() { -1.0 } else { 1.0 };

    let (Some(first), Some(last)) = (
        points.iter().map(|p| p.date).min(),
        points.iter().map(|p| p.date).max(),
    ) else {
        return Ok(());
    };
    let ys = value_range(points.iter().map(|p| p.y * sign)).unwrap_or((0.0, 1.0));
    let (y_lo, y_hi) = padded(ys.0, ys.1);

    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title(), ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (first - Duration::days(1))..(last + Duration::days(1)),
            y_lo..y_hi,
        )?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc(spec.y.label())
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .y_label_formatter(&|v: &f64| format!("{:.1}", v * sign))
        .draw()?;

    chart.draw_series(points.iter().map(|p| {
        Circle::new(
            (p.date, p.y * sign),
            radius(p.size),
            heat_color(p.color).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

pub fn render_heart_rates(
    run: &RunningWorkout,
    samples: &[HeartRateSample],
    out: &Path,
) -> Result<()> {
    if samples.is_empty() {
        return Err(Error::Plot(format!(
            "no heart-rate samples during the run starting {}",
            run.start
        )));
    }

    guard(|| match chart_kind(out) {
        ChartKind::Png => draw_heart_rates(
            BitMapBackend::new(out, CHART_SIZE).into_drawing_area(),
            run,
            samples,
        ),
        ChartKind::Svg => draw_heart_rates(
            SVGBackend::new(out, CHART_SIZE).into_drawing_area(),
            run,
            samples,
        ),
    })?;

    tracing::info!(path = %out.display(), samples = samples.len(), "heart-rate chart written");
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn minutes_between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

fn draw_heart_rates<DB>(
    root: DrawingArea<DB, Shift>,
    run: &RunningWorkout,
    samples: &[HeartRateSample],
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let x_max = minutes_between(run.start, run.end).max(1.0);
    let ys = value_range(samples.iter().map(|s| s.value)).unwrap_or((60.0, 200.0));
    let (y_lo, y_hi) = padded(ys.0, ys.1);

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Run on {}", run.date), ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_lo..y_hi)?;

    let start = run.start;
    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc("Heart Rate (bpm)")
        .x_label_formatter(&|m: &f64| {
            #[allow(clippy::cast_possible_truncation)]
            let offset = Duration::seconds((m * 60.0).round() as i64);
            (start + offset).format("%I:%M").to_string()
        })
        .draw()?;

    chart.draw_series(
        samples
            .iter()
            .map(|s| Circle::new((minutes_between(run.start, s.time), s.value), 3, RED.filled())),
    )?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_apple_datetime;

    fn run(day: u32, distance: Option<f64>, duration: f64, avg_hr: Option<f64>) -> RunningWorkout {
        let start = parse_apple_datetime(&format!("2021-08-{day:02} 07:00:00 -0400")).unwrap();
        RunningWorkout {
            date: start.date_naive(),
            start,
            end: start + Duration::minutes(30),
            distance,
            duration,
            pace: distance.map(|d| duration / d),
            speed: distance.map(|d| 60.0 * d / duration),
            avg_hr,
            max_hr: avg_hr.map(|h| h + 10.0),
            energy: None,
            temperature: None,
            humidity: None,
            indoor: Some(false),
        }
    }

    #[test]
    fn default_plot_is_pace_by_heart_rate_and_distance() {
        let spec = RunPlot::default();
        assert_eq!(RunPlot::new("Pace", "Avg HR", "Distance").unwrap(), spec);
    }

    #[test]
    fn rejects_unknown_and_non_numeric_fields() {
        assert!(matches!(
            RunPlot::new("Pace", "Cadence", "Distance"),
            Err(ConfigurationError::UnknownField { .. })
        ));
        assert!(matches!(
            RunPlot::new("Start", "Avg HR", "Distance"),
            Err(ConfigurationError::NonNumericField { role: "the y axis", .. })
        ));
    }

    #[test]
    fn points_are_scaled_and_incomplete_runs_dropped() {
        let runs = vec![
            run(1, Some(3.0), 30.0, Some(140.0)),
            run(2, Some(6.0), 54.0, Some(160.0)),
            run(3, None, 20.0, Some(150.0)),
            run(4, Some(4.5), 45.0, None),
        ];
        let points = run_points(&runs, &RunPlot::default());
        assert_eq!(points.len(), 2);

        assert!((points[0].y - 10.0).abs() < 1e-12);
        assert!((points[0].color - 0.0).abs() < 1e-12);
        assert!((points[0].size - 0.0).abs() < 1e-12);
        assert!((points[1].y - 9.0).abs() < 1e-12);
        assert!((points[1].color - 1.0).abs() < 1e-12);
        assert!((points[1].size - 1.0).abs() < 1e-12);
    }

    #[test]
    fn flat_ranges_map_to_the_middle() {
        let runs = vec![run(1, Some(3.0), 30.0, Some(140.0))];
        let points = run_points(&runs, &RunPlot::default());
        assert!((points[0].color - 0.5).abs() < f64::EPSILON);
        assert_eq!(radius(points[0].size), 9);
    }

    #[test]
    fn chart_kind_follows_extension() {
        assert!(matches!(chart_kind(Path::new("a/runs.PNG")), ChartKind::Png));
        assert!(matches!(chart_kind(Path::new("runs.svg")), ChartKind::Svg));
        assert!(matches!(chart_kind(Path::new("runs")), ChartKind::Svg));
    }

    #[test]
    fn empty_selection_is_an_error_before_drawing() {
        let runs = vec![run(3, None, 20.0, Some(150.0))];
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("runs.svg");
        let err = render_runs(&runs, &RunPlot::default(), &out).unwrap_err();
        assert!(matches!(err, Error::Plot(_)));
        assert!(!out.exists());
    }
}
