use crate::error::ParseError;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt};
use zip::ZipArchive;

#[macro_export]
macro_rules! dlog {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*);
    };
}

pub const EXPORT_FILE_NAME: &str = "export.xml";
pub const EXPORT_DIR_NAME: &str = "apple_health_export";
pub const ROUTES_DIR_NAME: &str = "workout-routes";

/// Timestamp layout used by every date attribute in the export.
pub const APPLE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Initialize colorful logging.
///
/// Default level is INFO.
/// - `-v` => DEBUG
/// - `-vv` => TRACE
/// - `-q` => WARN
/// - `-qq` => ERROR
///
/// `RUST_LOG` overrides everything (e.g. `RUST_LOG=trace`).
pub fn init_logging(verbose: u8, quiet: u8) {
    let net = i16::from(verbose) - i16::from(quiet);
    let level = match net {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        2..=i16::MAX => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,healthrun={level}")));

    let show_src = matches!(level, "debug" | "trace");

    fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_file(show_src)
        .with_line_number(show_src)
        .compact()
        .init();
}

/// Handle that keeps a tempdir alive if we extracted a ZIP.
pub struct ExportHandle {
    xml: PathBuf,
    _tmp: Option<TempDir>,
}

impl ExportHandle {
    pub fn xml(&self) -> &Path {
        &self.xml
    }

    /// Directory holding `export.xml` and, usually, `workout-routes/`.
    pub fn dir(&self) -> &Path {
        self.xml.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Accepts either:
/// - the `export.xml` file itself
/// - a directory containing `export.xml` or `apple_health_export/export.xml`
/// - a `.zip` file (as shared from the Health app) which we extract to a temp dir
pub fn open_export(path: &Path) -> Result<ExportHandle> {
    if path.is_dir() {
        let Some(xml) = find_export_xml(path) else {
            bail!("No {EXPORT_FILE_NAME} found in {}", path.display());
        };
        tracing::info!(path = %xml.display(), "using export directory");
        return Ok(ExportHandle { xml, _tmp: None });
    }

    let is_zip = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case("zip"));

    if !is_zip {
        // Plain XML path; a missing file is reported by the parser.
        return Ok(ExportHandle {
            xml: path.to_path_buf(),
            _tmp: None,
        });
    }

    let zip_file = File::open(path).with_context(|| format!("opening zip: {}", path.display()))?;
    let mut zip =
        ZipArchive::new(zip_file).with_context(|| format!("reading zip: {}", path.display()))?;

    let tmp = tempfile::tempdir().context("creating tempdir for export zip")?;
    tracing::info!(
        zip = %path.display(),
        tmp = %tmp.path().display(),
        entries = zip.len(),
        "extracting export zip"
    );

    for i in 0..zip.len() {
        let mut f = zip.by_index(i).context("reading zip entry")?;

        // Prevent Zip Slip / path traversal.
        let Some(rel) = f.enclosed_name() else {
            tracing::warn!(name = %f.name(), "skipping unsafe zip entry path");
            continue;
        };

        let out_path = tmp.path().join(&rel);

        if f.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("creating dir: {}", out_path.display()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating dir: {}", parent.display()))?;
        }

        let mut out = File::create(&out_path)
            .with_context(|| format!("creating file: {}", out_path.display()))?;
        io::copy(&mut f, &mut out)
            .with_context(|| format!("extracting file: {}", out_path.display()))?;
    }

    let Some(xml) = find_export_xml(tmp.path()) else {
        bail!(
            "ZIP extracted but doesn't contain {EXPORT_FILE_NAME}: {}",
            tmp.path().display()
        );
    };

    tracing::info!(export = %xml.display(), "export ready");

    Ok(ExportHandle {
        xml,
        _tmp: Some(tmp),
    })
}

fn find_export_xml(dir: &Path) -> Option<PathBuf> {
    [
        dir.join(EXPORT_FILE_NAME),
        dir.join(EXPORT_DIR_NAME).join(EXPORT_FILE_NAME),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

pub fn parse_apple_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s.trim(), APPLE_DATETIME_FORMAT).ok()
}

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*(\S*)\s*$")
        .expect("quantity regex is valid")
});

/// Split a metadata value such as `"75 degF"` into number and unit.
pub fn parse_quantity(s: &str) -> Option<(f64, &str)> {
    let caps = QUANTITY_RE.captures(s)?;
    let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let unit = caps.get(2).map_or("", |m| m.as_str());
    Some((value, unit))
}

pub fn to_miles(value: f64, unit: &str) -> Result<f64, ParseError> {
    let miles = match unit {
        "mi" => value,
        "km" => value / 1.609_344,
        "m" => value / 1_609.344,
        "yd" => value / 1_760.0,
        "ft" => value / 5_280.0,
        _ => return Err(unsupported("distance", unit)),
    };
    Ok(miles)
}

pub fn to_minutes(value: f64, unit: &str) -> Result<f64, ParseError> {
    let minutes = match unit {
        "min" => value,
        "s" => value / 60.0,
        "hr" | "h" => value * 60.0,
        _ => return Err(unsupported("duration", unit)),
    };
    Ok(minutes)
}

pub fn to_kcal(value: f64, unit: &str) -> Result<f64, ParseError> {
    let kcal = match unit {
        "Cal" | "kcal" => value,
        "kJ" => value / 4.184,
        _ => return Err(unsupported("energy", unit)),
    };
    Ok(kcal)
}

/// `"75 degF"` or `"24 degC"` to degrees Fahrenheit.
pub fn convert_temp(s: &str) -> Option<f64> {
    match parse_quantity(s)? {
        (v, "degF" | "") => Some(v),
        (v, "degC") => Some(v.mul_add(9.0 / 5.0, 32.0)),
        _ => None,
    }
}

/// The export stores humidity in hundredths of a percent: `"6500 %"` is 65%.
pub fn convert_hum(s: &str) -> Option<f64> {
    match parse_quantity(s)? {
        (v, "%" | "") => Some(v / 100.0),
        _ => None,
    }
}

pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "true" | "YES" => Some(true),
        "0" | "false" | "NO" => Some(false),
        _ => None,
    }
}

fn unsupported(quantity: &'static str, unit: &str) -> ParseError {
    ParseError::UnsupportedUnit {
        quantity,
        unit: unit.to_string(),
    }
}

/// Minutes as `hh:mm:ss`.
pub fn format_minutes(minutes: f64) -> String {
    let secs = (minutes * 60.0).round().abs() as u64;
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Pace in min/mi as `m'ss"`.
pub fn format_pace(pace: f64) -> String {
    let secs = (pace * 60.0).round().abs() as u64;
    format!("{}'{:02}\"", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quantities() {
        assert_eq!(parse_quantity("10 degF"), Some((10.0, "degF")));
        assert_eq!(parse_quantity("5000 %"), Some((5000.0, "%")));
        assert_eq!(parse_quantity(" 3.25"), Some((3.25, "")));
        assert_eq!(parse_quantity("warm"), None);
    }

    #[test]
    fn converts_weather_metadata() {
        assert!((convert_temp("10 degF").unwrap() - 10.0).abs() < 1e-10);
        assert!((convert_temp("100 degC").unwrap() - 212.0).abs() < 1e-10);
        assert!((convert_hum("5000 %").unwrap() - 50.0).abs() < 1e-10);
        assert_eq!(convert_temp("10 K"), None);
    }

    #[test]
    fn converts_units() {
        assert!((to_miles(1.609_344, "km").unwrap() - 1.0).abs() < 1e-12);
        assert!((to_minutes(90.0, "s").unwrap() - 1.5).abs() < 1e-12);
        assert!((to_kcal(418.4, "kJ").unwrap() - 100.0).abs() < 1e-9);
        assert!(matches!(
            to_miles(3.0, "furlong"),
            Err(ParseError::UnsupportedUnit { quantity: "distance", .. })
        ));
    }

    #[test]
    fn parses_export_timestamps() {
        let t = parse_apple_datetime("2021-08-09 18:54:12 -0400").unwrap();
        assert_eq!(t.to_rfc3339(), "2021-08-09T18:54:12-04:00");
        assert!(parse_apple_datetime("2021-08-09T18:54:12Z").is_none());
    }

    #[test]
    fn formats_durations_and_paces() {
        assert_eq!(format_minutes(61.5), "01:01:30");
        assert_eq!(format_pace(8.5), "8'30\"");
    }

    #[test]
    fn finds_xml_inside_extracted_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join(EXPORT_DIR_NAME);
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(EXPORT_FILE_NAME), "<HealthData/>").unwrap();

        let handle = open_export(tmp.path()).unwrap();
        assert_eq!(handle.xml(), nested.join(EXPORT_FILE_NAME));
        assert_eq!(handle.dir(), nested);
    }
}
