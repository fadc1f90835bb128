use crate::processor::DEFAULT_EXPORT_XML;
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "healthrun",
    about = "Running history and heart rate from an Apple Health export"
)]
pub struct Cli {
    /// Path to `export.xml`, the extracted `apple_health_export` directory, or `export.zip`.
    #[arg(
        short,
        long,
        value_name = "EXPORT",
        default_value = DEFAULT_EXPORT_XML,
        global = true
    )]
    pub export: PathBuf,

    /// How many runs to list when no subcommand is given (default: all).
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Increase log verbosity (-v, -vv). Defaults to INFO.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq). Defaults to INFO.
    #[arg(short = 'q', long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Print the runs table.
    Runs {
        /// Emit JSON instead of tab-separated rows.
        #[arg(long)]
        json: bool,
    },

    /// Print the heart-rate table.
    HeartRates {
        #[arg(long)]
        json: bool,

        /// Only print the last N samples.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Scatter plot of every run against its date.
    Plot {
        /// Field for the y axis.
        #[arg(long, default_value = "Pace")]
        y: String,

        /// Field used to colour the markers.
        #[arg(long, default_value = "Avg HR")]
        color: String,

        /// Field used to size the markers.
        #[arg(long, default_value = "Distance")]
        size: String,

        /// Output file; `.png` writes a bitmap, anything else SVG.
        #[arg(short, long, default_value = "runs.svg")]
        out: PathBuf,
    },

    /// Heart-rate trace of a single run.
    HrPlot {
        /// Day of the run, `YYYY-MM-DD`.
        #[arg(value_name = "DATE")]
        date: NaiveDate,

        /// Which run of that day (0 = earliest).
        #[arg(long, default_value_t = 0)]
        idx: usize,

        #[arg(short, long, default_value = "heart_rate.svg")]
        out: PathBuf,
    },

    /// Estimate distances of GPX workout routes.
    Route {
        /// A `.gpx` file or a directory of them. Default: `workout-routes/` next to the export.
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}
