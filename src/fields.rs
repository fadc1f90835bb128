//! Column names of the runs table and how to read them off a row.

use crate::error::ConfigurationError;
use crate::types::RunningWorkout;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunField {
    Date,
    Distance,
    Duration,
    Pace,
    Speed,
    AvgHr,
    MaxHr,
    Energy,
    Temperature,
    Humidity,
    Indoor,
    Start,
    End,
}

impl RunField {
    pub const ALL: [Self; 13] = [
        Self::Date,
        Self::Distance,
        Self::Duration,
        Self::Pace,
        Self::Speed,
        Self::AvgHr,
        Self::MaxHr,
        Self::Energy,
        Self::Temperature,
        Self::Humidity,
        Self::Indoor,
        Self::Start,
        Self::End,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Distance => "Distance",
            Self::Duration => "Duration",
            Self::Pace => "Pace",
            Self::Speed => "Speed",
            Self::AvgHr => "Avg HR",
            Self::MaxHr => "Max HR",
            Self::Energy => "Energy",
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Indoor => "Indoor",
            Self::Start => "Start",
            Self::End => "End",
        }
    }

    /// Axis label with unit.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Distance => "Distance [mi]",
            Self::Duration => "Duration [min]",
            Self::Pace => "Pace [min/mi]",
            Self::Speed => "Speed [mph]",
            Self::AvgHr => "Avg HR [bpm]",
            Self::MaxHr => "Max HR [bpm]",
            Self::Energy => "Energy [kcal]",
            Self::Temperature => "Temperature [degF]",
            Self::Humidity => "Humidity [%]",
            other => other.name(),
        }
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Date | Self::Start | Self::End)
    }

    /// Lower pace is better, so its axis runs top-down.
    pub const fn reversed_axis(self) -> bool {
        matches!(self, Self::Pace)
    }

    pub fn value(self, run: &RunningWorkout) -> Option<f64> {
        match self {
            Self::Distance => run.distance,
            Self::Duration => Some(run.duration),
            Self::Pace => run.pace,
            Self::Speed => run.speed,
            Self::AvgHr => run.avg_hr,
            Self::MaxHr => run.max_hr,
            Self::Energy => run.energy,
            Self::Temperature => run.temperature,
            Self::Humidity => run.humidity,
            Self::Indoor => run.indoor.map(|b| if b { 1.0 } else { 0.0 }),
            Self::Date | Self::Start | Self::End => None,
        }
    }

    /// Parse a field and require it to be numeric; `role` names the plot channel.
    pub fn numeric(name: &str, role: &'static str) -> Result<Self, ConfigurationError> {
        let field: Self = name.parse()?;
        if field.is_numeric() {
            Ok(field)
        } else {
            Err(ConfigurationError::NonNumericField {
                name: field.name().to_string(),
                role,
            })
        }
    }
}

impl fmt::Display for RunField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_lowercase() })
        .collect()
}

impl FromStr for RunField {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|f| normalize(f.name()) == wanted)
            .ok_or_else(|| ConfigurationError::UnknownField {
                name: s.to_string(),
                available: Self::ALL.map(Self::name).join(", "),
            })
    }
}
