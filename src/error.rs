use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the export document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("export file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("XML error at byte {position}: {reason}")]
    Xml { position: u64, reason: String },

    #[error("expected <HealthData> root element, found <{found}>")]
    UnexpectedRoot { found: String },

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> has invalid {attribute} {value:?}")]
    InvalidValue {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error(
        "<{element}> has a malformed attribute{}: {reason}",
        attribute.as_deref().map(|a| format!(" '{a}'")).unwrap_or_default()
    )]
    MalformedAttribute {
        element: &'static str,
        attribute: Option<String>,
        reason: String,
    },

    #[error("unsupported {quantity} unit {unit:?}")]
    UnsupportedUnit {
        quantity: &'static str,
        unit: String,
    },

    #[error("export contains no {0} records")]
    MissingRecordType(&'static str),

    #[error("document ended inside <{0}>")]
    Truncated(&'static str),
}

/// Invalid caller-supplied options.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown field '{name}' (available: {available})")]
    UnknownField { name: String, available: String },

    #[error("field '{name}' is not numeric and cannot be used for {role}")]
    NonNumericField { name: String, role: &'static str },

    #[error("run index {idx} out of range: {count} run(s) on {date}")]
    RunIndex {
        idx: usize,
        count: usize,
        date: chrono::NaiveDate,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("no runs on {0}")]
    NoRunOn(chrono::NaiveDate),

    #[error("plotting error: {0}")]
    Plot(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
