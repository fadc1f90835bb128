use crate::error::{ConfigurationError, Error, Result};
use crate::export::{ExportData, parse_export_file};
use crate::plot::{self, RunPlot};
use crate::types::{HeartRateSample, RunningWorkout, WorkoutRecord};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXPORT_XML: &str = "./apple_health_export/export.xml";

/// Heart-rate statistic computed over the samples inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrAggregate {
    Max,
    Mean,
    Median,
}

/// Holds the two tables derived from one export document.
#[derive(Debug, Clone)]
pub struct Processor {
    xml_file: PathBuf,
    heart_rates: Vec<HeartRateSample>,
    runs: Vec<RunningWorkout>,
}

impl Processor {
    pub fn new(xml_file: impl Into<PathBuf>) -> Self {
        Self {
            xml_file: xml_file.into(),
            heart_rates: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Construct and load in one step.
    pub fn open(xml_file: impl Into<PathBuf>) -> Result<Self> {
        let mut p = Self::new(xml_file);
        p.load()?;
        Ok(p)
    }

    pub fn xml_file(&self) -> &Path {
        &self.xml_file
    }

    /// Parse the export and rebuild both tables from scratch.
    ///
    /// On error the previously loaded tables are left untouched.
    pub fn load(&mut self) -> Result<()> {
        tracing::info!(path = %self.xml_file.display(), "processing export");
        let data = parse_export_file(&self.xml_file)?;
        let (heart_rates, runs) = build_tables(data);
        tracing::info!(
            heart_rates = heart_rates.len(),
            runs = runs.len(),
            "tables built"
        );
        self.heart_rates = heart_rates;
        self.runs = runs;
        Ok(())
    }

    pub fn heart_rates(&self) -> &[HeartRateSample] {
        &self.heart_rates
    }

    pub fn runs(&self) -> &[RunningWorkout] {
        &self.runs
    }

    /// Samples strictly inside the run's interval.
    pub fn samples_during(&self, run: &RunningWorkout) -> &[HeartRateSample] {
        samples_between(&self.heart_rates, run.start, run.end)
    }

    pub fn find_hr(&self, run: &RunningWorkout, mode: HrAggregate) -> Option<f64> {
        aggregate(self.samples_during(run), mode)
    }

    /// Runs that started on `date`, in start order.
    pub fn runs_on(&self, date: NaiveDate) -> Vec<&RunningWorkout> {
        self.runs.iter().filter(|r| r.date == date).collect()
    }

    /// Scatter of all runs against their date.
    ///
    /// Field names are validated before anything is drawn.
    pub fn run_plot(&self, y_data: &str, clr_data: &str, sz_data: &str, out: &Path) -> Result<()> {
        let spec = RunPlot::new(y_data, clr_data, sz_data)?;
        plot::render_runs(&self.runs, &spec, out)
    }

    /// Heart-rate trace of the `idx`-th run on `date`.
    pub fn hr_plot(&self, date: NaiveDate, idx: usize, out: &Path) -> Result<()> {
        let runs = self.runs_on(date);
        if runs.is_empty() {
            return Err(Error::NoRunOn(date));
        }
        if runs.len() > 1 {
            tracing::warn!(
                %date,
                count = runs.len(),
                idx,
                "multiple workouts match this date; use --idx to pick another"
            );
        }
        let Some(run) = runs.get(idx) else {
            return Err(ConfigurationError::RunIndex {
                idx,
                count: runs.len(),
                date,
            }
            .into());
        };
        plot::render_heart_rates(run, self.samples_during(run), out)
    }
}

fn build_tables(data: ExportData) -> (Vec<HeartRateSample>, Vec<RunningWorkout>) {
    let ExportData {
        mut heart_rates,
        mut workouts,
    } = data;

    heart_rates.sort_by_key(|s| s.time);
    workouts.sort_by_key(|w| w.start);

    let runs = workouts
        .into_iter()
        .map(|w| {
            let samples = samples_between(&heart_rates, w.start, w.end);
            to_run(w, samples)
        })
        .collect();

    (heart_rates, runs)
}

fn to_run(w: WorkoutRecord, samples: &[HeartRateSample]) -> RunningWorkout {
    let duration = w.duration_min;
    let distance = w.distance_mi;

    let pace = distance.filter(|d| *d > 0.0).map(|d| duration / d);
    let speed = distance
        .filter(|_| duration > 0.0)
        .map(|d| 60.0 * d / duration);

    RunningWorkout {
        date: w.start.date_naive(),
        start: w.start,
        end: w.end,
        distance,
        duration,
        pace,
        speed,
        avg_hr: aggregate(samples, HrAggregate::Mean),
        max_hr: aggregate(samples, HrAggregate::Max),
        energy: w.energy_kcal,
        temperature: w.temperature_f,
        humidity: w.humidity_pct,
        indoor: w.indoor,
    }
}

/// `sorted` must be ordered by time; bounds are exclusive.
fn samples_between(
    sorted: &[HeartRateSample],
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> &[HeartRateSample] {
    let lo = sorted.partition_point(|s| s.time <= start);
    let hi = sorted.partition_point(|s| s.time < end);
    if lo >= hi { &[] } else { &sorted[lo..hi] }
}

#[allow(clippy::cast_precision_loss)]
fn aggregate(samples: &[HeartRateSample], mode: HrAggregate) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let values = samples.iter().map(|s| s.value);
    match mode {
        HrAggregate::Max => values.reduce(f64::max),
        HrAggregate::Mean => Some(values.sum::<f64>() / samples.len() as f64),
        HrAggregate::Median => {
            let mut v: Vec<f64> = values.collect();
            v.sort_by(f64::total_cmp);
            let mid = v.len() / 2;
            if v.len() % 2 == 0 {
                Some(f64::midpoint(v[mid - 1], v[mid]))
            } else {
                Some(v[mid])
            }
        }
    }
}
