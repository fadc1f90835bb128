use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartRateSample {
    pub time: DateTime<FixedOffset>,
    pub value: f64,
    pub unit: String,
}

/// One row of the runs table. Distances are miles, durations minutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunningWorkout {
    pub date: NaiveDate,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,

    pub distance: Option<f64>,
    pub duration: f64,
    pub pace: Option<f64>,
    pub speed: Option<f64>,

    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,

    pub energy: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub indoor: Option<bool>,
}

/// Workout attributes as read from the export, before the heart-rate join.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub duration_min: f64,
    pub distance_mi: Option<f64>,
    pub energy_kcal: Option<f64>,
    pub temperature_f: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub indoor: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GpxPoint {
    pub t: Option<DateTime<FixedOffset>>,
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub path: PathBuf,
    pub points: usize,
    pub distance_mi: f64,
    /// Sum of climbs between consecutive points with an elevation, in meters.
    pub elevation_gain_m: Option<f64>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}
