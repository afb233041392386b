//! Command line definition

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use sg_core::transform::OffsetUnit;

#[derive(Debug, Parser)]
#[command(name = "speleograph", version, about = "Read, correct and combine cave logger series")]
pub struct Cli {
    /// Settings file, `speleograph.toml` in the working directory by default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the series found in each file
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Save every series of the given files into one native file
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Move a series, or every series of the file, in time
    Shift {
        #[command(flatten)]
        io: FileArgs,
        #[arg(long, allow_negative_numbers = true)]
        amount: i64,
        #[arg(long, value_parser = parse_unit, default_value = "hour")]
        unit: OffsetUnit,
        /// Shift only this series
        #[arg(long)]
        series: Option<String>,
    },
    /// Sum a series over fixed periods
    Resample {
        #[command(flatten)]
        io: FileArgs,
        #[arg(long)]
        series: String,
        /// Period length, e.g. `1h` or `1day`
        #[arg(long, value_parser = parse_bucket)]
        bucket: chrono::Duration,
    },
    /// Add the running sum of a series
    Cumulate {
        #[command(flatten)]
        io: FileArgs,
        #[arg(long)]
        series: String,
    },
    /// Remove the mean offset between two series
    Recalibrate {
        #[command(flatten)]
        io: FileArgs,
        #[arg(long)]
        reference: String,
        #[arg(long)]
        target: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Derive water height from a standard and an immersed pressure series
    WaterHeight {
        #[command(flatten)]
        io: FileArgs,
        #[arg(long)]
        standard: String,
        #[arg(long)]
        target: String,
    },
    /// Drop items outside a date window
    Limit {
        #[command(flatten)]
        io: FileArgs,
        /// Limit only this series
        #[arg(long)]
        series: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Debug, Args)]
pub struct FileArgs {
    pub file: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct WindowArgs {
    #[arg(long, value_parser = parse_date)]
    pub from: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_date)]
    pub to: Option<DateTime<Utc>>,
}

fn parse_unit(text: &str) -> Result<OffsetUnit, String> {
    text.parse()
}

/// Humantime duration such as `15min` or `1day`
pub fn parse_bucket(text: &str) -> Result<chrono::Duration, String> {
    let duration = humantime::parse_duration(text).map_err(|e| e.to_string())?;
    chrono::Duration::from_std(duration).map_err(|e| e.to_string())
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, read as UTC when no offset is given
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(local) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&local));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|local| Utc.from_utc_datetime(&local))
        .ok_or_else(|| format!("unreadable date '{}'", text))
}
