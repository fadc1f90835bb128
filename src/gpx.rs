use crate::error::{Error, ParseError, Result};
use crate::types::{GpxPoint, RouteSummary};
use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use walkdir::WalkDir;

/// Miles per degree of latitude.
const MI_PER_DEG_LAT: f64 = 69.0;
/// Miles per degree of longitude at the equator.
const MI_PER_DEG_LON: f64 = 69.172;

pub fn parse_gpx_file(path: &Path) -> Result<Vec<GpxPoint>> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_gpx_points(BufReader::new(file))?)
}

pub fn parse_gpx_points<R: BufRead>(reader: R) -> Result<Vec<GpxPoint>, ParseError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();

    let mut st = GpxState::default();
    let mut out: Vec<GpxPoint> = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => handle_gpx_start(&mut st, &e),
            Ok(Event::Empty(e)) if e.name().as_ref() == b"trkpt" => {
                handle_gpx_start(&mut st, &e);
                st.finish_point(&mut out);
            }
            Ok(Event::End(e)) => handle_gpx_end(&mut st, &e, &mut out),
            Ok(Event::Text(e)) => {
                handle_gpx_text(&mut st, &e);
            }
            Err(e) => {
                return Err(ParseError::Xml {
                    position: xml.buffer_position(),
                    reason: e.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[derive(Default)]
struct GpxState {
    in_trkpt: bool,
    in_time: bool,
    in_ele: bool,

    cur_lat: Option<f64>,
    cur_lon: Option<f64>,
    cur_time: Option<DateTime<FixedOffset>>,
    cur_ele: Option<f64>,
}

impl GpxState {
    fn finish_point(&mut self, out: &mut Vec<GpxPoint>) {
        self.in_trkpt = false;

        let (Some(lat), Some(lon)) = (self.cur_lat, self.cur_lon) else {
            return;
        };

        out.push(GpxPoint {
            t: self.cur_time,
            lat,
            lon,
            ele: self.cur_ele,
        });
    }
}

fn handle_gpx_start(st: &mut GpxState, e: &BytesStart<'_>) {
    match e.name().as_ref() {
        b"trkpt" => {
            st.in_trkpt = true;
            st.in_time = false;
            st.in_ele = false;

            st.cur_time = None;
            st.cur_ele = None;

            let (lat, lon) = parse_trkpt_lat_lon(e);
            st.cur_lat = lat;
            st.cur_lon = lon;
        }
        b"time" if st.in_trkpt => {
            st.in_time = true;
        }
        b"ele" if st.in_trkpt => {
            st.in_ele = true;
        }
        _ => {}
    }
}

fn handle_gpx_end(st: &mut GpxState, e: &BytesEnd<'_>, out: &mut Vec<GpxPoint>) {
    match e.name().as_ref() {
        b"time" => st.in_time = false,
        b"ele" => st.in_ele = false,
        b"trkpt" => st.finish_point(out),
        _ => {}
    }
}

fn handle_gpx_text(st: &mut GpxState, e: &quick_xml::events::BytesText<'_>) {
    if st.in_time
        && let Ok(s) = e.decode()
        && let Ok(t) = DateTime::parse_from_rfc3339(s.as_ref())
    {
        st.cur_time = Some(t);
    } else if st.in_ele
        && let Ok(s) = e.decode()
        && let Ok(v) = s.parse::<f64>()
    {
        st.cur_ele = Some(v);
    }
}

fn parse_trkpt_lat_lon(e: &BytesStart<'_>) -> (Option<f64>, Option<f64>) {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for a in e.attributes().with_checks(false).flatten() {
        let key = a.key.as_ref();
        if key == b"lat"
            && let Ok(v) = a.unescape_value()
        {
            lat = v.parse::<f64>().ok();
        } else if key == b"lon"
            && let Ok(v) = a.unescape_value()
        {
            lon = v.parse::<f64>().ok();
        }
    }

    (lat, lon)
}

/// Planar track length in miles.
///
/// Points are projected around their mean latitude, which is accurate enough
/// for the few miles a run covers.
#[allow(clippy::cast_precision_loss)]
pub fn route_distance_mi(points: &[GpxPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mean_lat = points.iter().map(|p| p.lat).sum::<f64>() / points.len() as f64;
    let sx = MI_PER_DEG_LAT;
    let sy = mean_lat.to_radians().cos() * MI_PER_DEG_LON;

    points
        .windows(2)
        .map(|w| {
            let dx = (w[1].lat - w[0].lat) * sx;
            let dy = (w[1].lon - w[0].lon) * sy;
            dx.hypot(dy)
        })
        .sum()
}

pub fn elevation_gain_m(points: &[GpxPoint]) -> Option<f64> {
    let eles: Vec<f64> = points.iter().filter_map(|p| p.ele).collect();
    if eles.is_empty() {
        return None;
    }
    Some(eles.windows(2).map(|w| (w[1] - w[0]).max(0.0)).sum())
}

pub fn summarize_route(path: &Path) -> Result<RouteSummary> {
    let points = parse_gpx_file(path)?;
    Ok(RouteSummary {
        path: path.to_path_buf(),
        points: points.len(),
        distance_mi: route_distance_mi(&points),
        elevation_gain_m: elevation_gain_m(&points),
        start: points.iter().find_map(|p| p.t),
        end: points.iter().rev().find_map(|p| p.t),
    })
}

/// Summaries for one `.gpx` file or every `.gpx` below a directory, sorted by path.
pub fn summarize_routes(path: &Path) -> Result<Vec<RouteSummary>> {
    if path.is_file() {
        return Ok(vec![summarize_route(path)?]);
    }

    let mut files: Vec<_> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(err = %err, "skipping unreadable route entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case("gpx"))
        })
        .collect();
    files.sort();

    tracing::info!(dir = %path.display(), files = files.len(), "found workout routes");
    files.iter().map(|p| summarize_route(p)).collect()
}
