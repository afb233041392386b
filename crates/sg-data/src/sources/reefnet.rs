//! Reefnet Sensus CSV exports
//!
//! One record per sample:
//! `index, device id, series id, year, month, day, hour, minute, second,
//! elapsed seconds, pressure (mbar), temperature (K)[, extra]`.
//! The calendar fields give the start of the series; each sample is dated
//! by adding its elapsed seconds to that start.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use csv::Trim;
use sg_core::types::{TypeKind, TypeRegistry};
use sg_core::{Item, Origin, Series};
use tracing::{info, warn};

use super::{line_of, line_of_error, read_text, ColumnSeries, DataFileReader, SNIFF_LINES};
use crate::config::ReaderConfig;
use crate::FileReadingError;

const MIN_FIELDS: usize = 12;
const MAX_FIELDS: usize = 13;
const KELVIN_OFFSET: f64 = 273.15;

pub struct ReefnetReader {
    config: ReaderConfig,
}

impl ReefnetReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }
}

impl Default for ReefnetReader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

fn is_record(fields: &[&str], prefix: &str) -> bool {
    (MIN_FIELDS..=MAX_FIELDS).contains(&fields.len()) && fields[1].starts_with(prefix)
}

/// Whether the first lines look like Sensus records.
///
/// Blank and single-field lines are ignored. The first multi-field line
/// decides: it must be a record whose device id starts with `prefix`.
pub fn is_reefnet_file(lines: &[String], prefix: &str) -> bool {
    for line in lines.iter().take(SNIFF_LINES) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            continue;
        }
        return is_record(&fields, prefix);
    }
    false
}

/// Start instant of a series from calendar fields `[3..=8]`
fn start_of(fields: &[&str]) -> Option<DateTime<Utc>> {
    let number = |i: usize| fields.get(i)?.parse::<u32>().ok();
    let year = fields.get(3)?.parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(4)?, number(5)?)?;
    let time = date.and_hms_opt(number(6)?, number(7)?, number(8)?)?;
    Some(Utc.from_utc_datetime(&time))
}

impl DataFileReader for ReefnetReader {
    fn name(&self) -> &'static str {
        "Reefnet"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn sniff(&self, _path: &Path, first_lines: &[String]) -> bool {
        is_reefnet_file(first_lines, &self.config.reefnet_device_prefix)
    }

    fn read_file(&self, path: &Path, types: &TypeRegistry) -> Result<Vec<Series>, FileReadingError> {
        let text = read_text(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let origin = Origin::new(path);
        let mut pressure: Option<ColumnSeries> = None;
        let mut temperature: Option<ColumnSeries> = None;
        let mut current: Option<(String, DateTime<Utc>)> = None;
        let mut skipped = 0usize;

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("{}; line skipped", FileReadingError::body(path, line_of_error(&e), e.to_string()));
                    skipped += 1;
                    continue;
                }
            };
            let line = line_of(&record);
            let fields: Vec<&str> = record.iter().collect();
            if !is_record(&fields, &self.config.reefnet_device_prefix) {
                if fields.len() > 1 {
                    warn!("{}: skipping line {}: not a Sensus record", path.display(), line);
                    skipped += 1;
                }
                continue;
            }

            let device = fields[1];
            let series_id = fields[2];
            let start = match &current {
                Some((id, start)) if id == series_id => *start,
                _ => {
                    let start = start_of(&fields).ok_or_else(|| {
                        FileReadingError::data(path, line, format!("invalid start date for series {}", series_id))
                    })?;
                    current = Some((series_id.to_string(), start));
                    start
                }
            };
            let Some(elapsed) = fields[9].parse::<i64>().ok() else {
                warn!("{}: skipping line {}: bad elapsed time '{}'", path.display(), line, fields[9]);
                skipped += 1;
                continue;
            };
            let Some(date) = Duration::try_seconds(elapsed).and_then(|d| start.checked_add_signed(d)) else {
                let message = format!("elapsed time {} s puts the date out of range", elapsed);
                warn!("{}; line skipped", FileReadingError::data(path, line, message));
                skipped += 1;
                continue;
            };

            let pressure = pressure.get_or_insert_with(|| {
                let series = Series::new(format!("{} - Pression", device), types.for_kind(TypeKind::Pressure, "mbar"))
                    .with_origin(origin.clone());
                ColumnSeries::single(10, series)
            });
            if let Some(mbar) = self.config.null.parse_value(fields[10]) {
                pressure.push(Item::new(date, mbar));
            }
            let temperature = temperature.get_or_insert_with(|| {
                let series = Series::new(
                    format!("{} - Température", device),
                    types.for_kind(TypeKind::Temperature, "°C"),
                )
                .with_origin(origin.clone());
                ColumnSeries::single(11, series)
            });
            if let Some(kelvin) = self.config.null.parse_value(fields[11]) {
                temperature.push(Item::new(date, kelvin - KELVIN_OFFSET));
            }
        }

        if pressure.is_none() {
            return Err(FileReadingError::head(path, 0, "no Sensus record"));
        }
        let series: Vec<Series> = pressure
            .into_iter()
            .chain(temperature)
            .map(ColumnSeries::finish)
            .collect();
        info!(
            "Read {} series from {} ({} lines skipped)",
            series.len(),
            path.display(),
            skipped
        );
        Ok(series)
    }
}
