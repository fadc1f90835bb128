#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::Parser;
use healthrun::cli::{self, Cmd};
use healthrun::types::{HeartRateSample, RunningWorkout};
use healthrun::{Processor, RunField, gpx, utils};
use std::io::{self, BufWriter, Write};

#[macro_use]
extern crate healthrun;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    utils::init_logging(cli.verbose, cli.quiet);

    let export_handle = utils::open_export(&cli.export)?;

    let load = || {
        Processor::open(export_handle.xml())
            .with_context(|| format!("loading export: {}", export_handle.xml().display()))
    };

    match cli.cmd {
        Some(Cmd::Route { path, json }) => {
            let path = path.unwrap_or_else(|| export_handle.dir().join(utils::ROUTES_DIR_NAME));
            dlog!("mode=route path={}", path.display());
            let routes = gpx::summarize_routes(&path)
                .with_context(|| format!("reading routes: {}", path.display()))?;
            let mut out = BufWriter::new(io::stdout().lock());
            if json {
                serde_json::to_writer_pretty(&mut out, &routes)?;
                writeln!(out)?;
            } else {
                for r in &routes {
                    let start = r.start.map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
                    let gain = r
                        .elevation_gain_m
                        .map_or_else(|| "-".to_string(), |g| format!("{g:.0} m"));
                    writeln!(
                        out,
                        "{}\t{start}\t{}\t{:.2} mi\t{gain}",
                        r.path.display(),
                        r.points,
                        r.distance_mi
                    )?;
                }
            }
            out.flush()?;
        }
        Some(Cmd::Runs { json }) => {
            dlog!("mode=runs json={json}");
            let processor = load()?;
            let mut out = BufWriter::new(io::stdout().lock());
            if json {
                serde_json::to_writer_pretty(&mut out, processor.runs())?;
                writeln!(out)?;
            } else {
                write_runs_tsv(&mut out, processor.runs())?;
            }
            out.flush()?;
        }
        Some(Cmd::HeartRates { json, limit }) => {
            dlog!("mode=heart-rates json={json} limit={limit:?}");
            let processor = load()?;
            let all = processor.heart_rates();
            let rows = limit.map_or(all, |n| &all[all.len().saturating_sub(n)..]);
            let mut out = BufWriter::new(io::stdout().lock());
            if json {
                serde_json::to_writer_pretty(&mut out, rows)?;
                writeln!(out)?;
            } else {
                write_heart_rates_tsv(&mut out, rows)?;
            }
            out.flush()?;
        }
        Some(Cmd::Plot {
            y,
            color,
            size,
            out,
        }) => {
            dlog!("mode=plot y={y} color={color} size={size} out={}", out.display());
            let processor = load()?;
            processor.run_plot(&y, &color, &size, &out)?;
            println!("{}", out.display());
        }
        Some(Cmd::HrPlot { date, idx, out }) => {
            dlog!("mode=hr-plot date={date} idx={idx} out={}", out.display());
            let processor = load()?;
            processor.hr_plot(date, idx, &out)?;
            println!("{}", out.display());
        }
        None => {
            dlog!("mode=summary count={:?}", cli.count);
            let processor = load()?;
            let runs = processor.runs();
            let count = cli.count.unwrap_or(runs.len());
            for (i, r) in runs.iter().rev().take(count).enumerate() {
                let distance = r
                    .distance
                    .map_or_else(|| "-".to_string(), |d| format!("{d:.2} mi"));
                let pace = r.pace.map_or_else(|| "-".to_string(), utils::format_pace);
                let hr = r
                    .avg_hr
                    .map_or_else(|| "-".to_string(), |h| format!("{h:.0} bpm"));
                println!(
                    "{}\t{}\t{}\t{distance}\t{}\t{pace}\t{hr}",
                    i + 1,
                    r.date,
                    r.start.format("%H:%M"),
                    utils::format_minutes(r.duration),
                );
            }
        }
    }

    Ok(())
}

fn cell(field: RunField, r: &RunningWorkout) -> String {
    match field {
        RunField::Date => r.date.to_string(),
        RunField::Start => r.start.to_rfc3339(),
        RunField::End => r.end.to_rfc3339(),
        RunField::Indoor => r.indoor.map_or_else(String::new, |b| b.to_string()),
        numeric => numeric
            .value(r)
            .map_or_else(String::new, |v| format!("{v:.3}")),
    }
}

fn write_runs_tsv(out: &mut impl Write, runs: &[RunningWorkout]) -> io::Result<()> {
    let header: Vec<&str> = RunField::ALL.iter().map(|f| f.name()).collect();
    writeln!(out, "{}", header.join("\t"))?;
    for r in runs {
        let row: Vec<String> = RunField::ALL.iter().map(|f| cell(*f, r)).collect();
        writeln!(out, "{}", row.join("\t"))?;
    }
    Ok(())
}

fn write_heart_rates_tsv(out: &mut impl Write, rows: &[HeartRateSample]) -> io::Result<()> {
    writeln!(out, "Time\tValue\tUnit")?;
    for s in rows {
        writeln!(out, "{}\t{}\t{}", s.time.to_rfc3339(), s.value, s.unit)?;
    }
    Ok(())
}
