//! Streaming reader for the Health app's `export.xml`.
//!
//! Only two record kinds are kept: heart-rate `Record`s and running
//! `Workout`s (with their `MetadataEntry` / `WorkoutStatistics` children).
//! Everything else is skipped without being materialized.

use crate::dlog;
use crate::error::ParseError;
use crate::types::{HeartRateSample, WorkoutRecord};
use crate::utils::{
    convert_hum, convert_temp, parse_apple_datetime, parse_flag, to_kcal, to_miles, to_minutes,
};
use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

pub const HEART_RATE_TYPE: &str = "HKQuantityTypeIdentifierHeartRate";
pub const RUNNING_ACTIVITY: &str = "HKWorkoutActivityTypeRunning";
const DISTANCE_STAT: &str = "HKQuantityTypeIdentifierDistanceWalkingRunning";
const ENERGY_STAT: &str = "HKQuantityTypeIdentifierActiveEnergyBurned";

const META_TEMPERATURE: &str = "HKWeatherTemperature";
const META_HUMIDITY: &str = "HKWeatherHumidity";
const META_INDOOR: &str = "HKIndoorWorkout";

/// Raw contents of an export, in document order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExportData {
    pub heart_rates: Vec<HeartRateSample>,
    pub workouts: Vec<WorkoutRecord>,
}

pub fn parse_export_file(path: &Path) -> Result<ExportData, ParseError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ParseError::Missing {
            path: path.to_path_buf(),
        },
        _ => ParseError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    parse_export(BufReader::new(file))
}

pub fn parse_export<R: BufRead>(reader: R) -> Result<ExportData, ParseError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut st = ExportState::default();

    loop {
        let event = xml.read_event_into(&mut buf).map_err(|e| ParseError::Xml {
            position: xml.buffer_position(),
            reason: e.to_string(),
        })?;
        match event {
            Event::Eof => break,
            Event::Start(e) => st.handle_start(&e, false)?,
            Event::Empty(e) => st.handle_start(&e, true)?,
            Event::End(e) => match e.name().as_ref() {
                b"Workout" => st.finish_workout(),
                b"HealthData" => st.closed_root = true,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    st.finish()
}

#[derive(Default)]
struct ExportState {
    saw_root: bool,
    closed_root: bool,
    skipped_records: usize,
    skipped_workouts: usize,

    workout: Option<WorkoutBuilder>,

    out: ExportData,
}

/// A `<Workout>` whose children are still being read.
struct WorkoutBuilder {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    duration_min: f64,
    distance_mi: Option<f64>,
    energy_kcal: Option<f64>,
    metadata: HashMap<String, String>,
}

impl ExportState {
    fn handle_start(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), ParseError> {
        let name = e.name();
        if !self.saw_root {
            if name.as_ref() != b"HealthData" {
                return Err(ParseError::UnexpectedRoot {
                    found: String::from_utf8_lossy(name.as_ref()).into_owned(),
                });
            }
            self.saw_root = true;
            self.closed_root = empty;
            return Ok(());
        }

        match name.as_ref() {
            b"Record" if self.workout.is_none() => self.handle_record(e),
            b"Workout" => {
                let attrs = attributes(e, "Workout")?;
                if attrs.get("workoutActivityType").map(String::as_str) != Some(RUNNING_ACTIVITY) {
                    self.skipped_workouts += 1;
                    return Ok(());
                }
                self.workout = Some(WorkoutBuilder::from_attributes(&attrs)?);
                if empty {
                    self.finish_workout();
                }
                Ok(())
            }
            b"MetadataEntry" => {
                if let Some(w) = self.workout.as_mut() {
                    let mut attrs = attributes(e, "MetadataEntry")?;
                    if let (Some(k), Some(v)) = (attrs.remove("key"), attrs.remove("value")) {
                        w.metadata.insert(k, v);
                    }
                }
                Ok(())
            }
            b"WorkoutStatistics" => match self.workout.as_mut() {
                Some(w) => w.apply_statistics(&attributes(e, "WorkoutStatistics")?),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn handle_record(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let attrs = attributes(e, "Record")?;
        if attrs.get("type").map(String::as_str) != Some(HEART_RATE_TYPE) {
            self.skipped_records += 1;
            return Ok(());
        }

        let time = required_time(&attrs, "Record", "endDate")?;
        let raw = required(&attrs, "Record", "value")?;
        let value = raw.trim().parse::<f64>().map_err(|_| ParseError::InvalidValue {
            element: "Record",
            attribute: "value",
            value: raw.to_string(),
        })?;
        let unit = attrs
            .get("unit")
            .cloned()
            .unwrap_or_else(|| "count/min".to_string());

        self.out.heart_rates.push(HeartRateSample { time, value, unit });
        Ok(())
    }

    fn finish_workout(&mut self) {
        if let Some(w) = self.workout.take() {
            self.out.workouts.push(w.build());
        }
    }

    fn finish(self) -> Result<ExportData, ParseError> {
        if !self.saw_root {
            return Err(ParseError::UnexpectedRoot {
                found: "nothing".to_string(),
            });
        }
        if self.workout.is_some() {
            return Err(ParseError::Truncated("Workout"));
        }
        if !self.closed_root {
            return Err(ParseError::Truncated("HealthData"));
        }
        dlog!(
            "export parsed heart_rates={} runs={} skipped_records={} skipped_workouts={}",
            self.out.heart_rates.len(),
            self.out.workouts.len(),
            self.skipped_records,
            self.skipped_workouts
        );
        if self.out.heart_rates.is_empty() {
            return Err(ParseError::MissingRecordType(HEART_RATE_TYPE));
        }
        if self.out.workouts.is_empty() {
            return Err(ParseError::MissingRecordType(RUNNING_ACTIVITY));
        }
        Ok(self.out)
    }
}

impl WorkoutBuilder {
    fn from_attributes(attrs: &HashMap<String, String>) -> Result<Self, ParseError> {
        let start = required_time(attrs, "Workout", "startDate")?;
        let end = required_time(attrs, "Workout", "endDate")?;

        let duration = required_number(attrs, "Workout", "duration")?;
        let duration_unit = attrs.get("durationUnit").map_or("min", String::as_str);
        let duration_min = to_minutes(duration, duration_unit)?;

        let distance_mi = match optional_number(attrs, "Workout", "totalDistance")? {
            Some(v) => Some(to_miles(v, unit_of(attrs, "totalDistanceUnit", "mi"))?),
            None => None,
        };
        let energy_kcal = match optional_number(attrs, "Workout", "totalEnergyBurned")? {
            Some(v) => Some(to_kcal(v, unit_of(attrs, "totalEnergyBurnedUnit", "Cal"))?),
            None => None,
        };

        Ok(Self {
            start,
            end,
            duration_min,
            distance_mi,
            energy_kcal,
            metadata: HashMap::new(),
        })
    }

    /// Newer exports move totals into `<WorkoutStatistics>` children.
    fn apply_statistics(&mut self, attrs: &HashMap<String, String>) -> Result<(), ParseError> {
        let Some(kind) = attrs.get("type") else {
            return Ok(());
        };
        let Some(sum) = optional_number(attrs, "WorkoutStatistics", "sum")? else {
            return Ok(());
        };
        match kind.as_str() {
            DISTANCE_STAT if self.distance_mi.is_none() => {
                self.distance_mi = Some(to_miles(sum, unit_of(attrs, "unit", "mi"))?);
            }
            ENERGY_STAT if self.energy_kcal.is_none() => {
                self.energy_kcal = Some(to_kcal(sum, unit_of(attrs, "unit", "Cal"))?);
            }
            _ => {}
        }
        Ok(())
    }

    fn build(self) -> WorkoutRecord {
        let meta = |key: &str| self.metadata.get(key).map(String::as_str);

        let temperature_f = meta(META_TEMPERATURE).and_then(|s| {
            let v = convert_temp(s);
            if v.is_none() {
                tracing::warn!(value = s, "ignoring unreadable temperature");
            }
            v
        });
        let humidity_pct = meta(META_HUMIDITY).and_then(|s| {
            let v = convert_hum(s);
            if v.is_none() {
                tracing::warn!(value = s, "ignoring unreadable humidity");
            }
            v
        });
        let indoor = meta(META_INDOOR).and_then(parse_flag);

        WorkoutRecord {
            start: self.start,
            end: self.end,
            duration_min: self.duration_min,
            distance_mi: self.distance_mi,
            energy_kcal: self.energy_kcal,
            temperature_f,
            humidity_pct,
            indoor,
        }
    }
}

fn attributes(
    e: &BytesStart<'_>,
    element: &'static str,
) -> Result<HashMap<String, String>, ParseError> {
    let mut out = HashMap::new();
    for a in e.attributes().with_checks(false) {
        let a = a.map_err(|err| ParseError::MalformedAttribute {
            element,
            attribute: None,
            reason: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a
            .unescape_value()
            .map_err(|err| ParseError::MalformedAttribute {
                element,
                attribute: Some(key.clone()),
                reason: err.to_string(),
            })?;
        out.insert(key, value.into_owned());
    }
    Ok(out)
}

fn unit_of<'a>(attrs: &'a HashMap<String, String>, key: &str, default: &'a str) -> &'a str {
    attrs.get(key).map_or(default, |s| s.trim())
}

fn required<'a>(
    attrs: &'a HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ParseError> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or(ParseError::MissingAttribute { element, attribute })
}

fn required_time(
    attrs: &HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<DateTime<FixedOffset>, ParseError> {
    let raw = required(attrs, element, attribute)?;
    parse_apple_datetime(raw).ok_or_else(|| ParseError::InvalidValue {
        element,
        attribute,
        value: raw.to_string(),
    })
}

fn required_number(
    attrs: &HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<f64, ParseError> {
    optional_number(attrs, element, attribute)?
        .ok_or(ParseError::MissingAttribute { element, attribute })
}

fn optional_number(
    attrs: &HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<Option<f64>, ParseError> {
    let Some(raw) = attrs.get(attribute) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ParseError::InvalidValue {
            element,
            attribute,
            value: raw.clone(),
        })
}
