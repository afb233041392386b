//! Weather Underground history exports (hourly and daily)

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use csv::Trim;
use sg_core::types::{SeriesType, TypeKind, TypeRegistry, TEMPERATURE_MIN_MAX, WATER};
use sg_core::{Origin, Series};
use tracing::{debug, info, warn};

use super::{find_column, line_of, line_of_error, read_text, ColumnSeries, DataFileReader};
use crate::config::ReaderConfig;
use crate::date_format::DatePattern;
use crate::FileReadingError;

const HOURLY_PATTERN: &str = "yyyy-MM-dd HH:mm:ss";
const DAILY_PATTERN: &str = "yyyy-MM-dd";

const UTC_DATE_COLUMN: &str = "DateUTC";
const DATE_COLUMN: [&str; 2] = ["Time", "Date"];
const TEMPERATURE_COLUMN: &str = "TemperatureC";
const HIGH_COLUMN: &str = "TemperatureHighC";
const LOW_COLUMN: &str = "TemperatureLowC";
const PRESSURE_COLUMN: &str = "PressurehPa";
const RAIN_COLUMNS: [&str; 3] = ["HourlyPrecipMM", "dailyrainMM", "PrecipitationSumCM"];

/// Every column name this reader knows, for sniffing
const KNOWN_COLUMNS: [&str; 7] = [
    TEMPERATURE_COLUMN,
    HIGH_COLUMN,
    LOW_COLUMN,
    PRESSURE_COLUMN,
    RAIN_COLUMNS[0],
    RAIN_COLUMNS[1],
    RAIN_COLUMNS[2],
];

pub struct WundergroundReader {
    config: ReaderConfig,
    patterns: [DatePattern; 2],
}

impl WundergroundReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            patterns: [DatePattern::new(HOURLY_PATTERN), DatePattern::new(DAILY_PATTERN)],
        }
    }

    /// Dates in these files are either UTC or station-local without zone; both are read as UTC
    fn parse_date(&self, text: &str) -> Option<DateTime<Utc>> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.parse(text))
            .map(|local| Utc.from_utc_datetime(&local))
    }
}

impl Default for WundergroundReader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

fn clean(text: &str) -> String {
    text.replace("<br>", "").replace("<br />", "")
}

impl DataFileReader for WundergroundReader {
    fn name(&self) -> &'static str {
        "Wunderground"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn sniff(&self, _path: &Path, first_lines: &[String]) -> bool {
        first_lines.iter().any(|line| {
            DATE_COLUMN.iter().any(|c| line.contains(c)) && KNOWN_COLUMNS.iter().any(|c| line.contains(c))
        })
    }

    fn read_file(&self, path: &Path, types: &TypeRegistry) -> Result<Vec<Series>, FileReadingError> {
        let text = clean(&read_text(path)?);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        let header = loop {
            match records.next() {
                Some(Ok(record)) if find_column(&record, &DATE_COLUMN).is_some() => break record,
                Some(Ok(record)) => debug!("Skipping line {} before the header", line_of(&record)),
                Some(Err(e)) => return Err(FileReadingError::head(path, line_of_error(&e), e.to_string())),
                None => return Err(FileReadingError::head(path, 0, "missing date column")),
            }
        };
        let date_column = find_column(&header, &[UTC_DATE_COLUMN])
            .or_else(|| find_column(&header, &DATE_COLUMN))
            .unwrap_or(0);

        let origin = Origin::new(path);
        let new_series = |name: &str, series_type: Arc<SeriesType>| Series::new(name, series_type).with_origin(origin.clone());
        let mut columns = Vec::new();
        if let Some(column) = find_column(&header, &[TEMPERATURE_COLUMN]) {
            let series = new_series("Température", types.for_kind(TypeKind::Temperature, "°C"));
            columns.push(ColumnSeries::single(column, series));
        }
        if let (Some(low), Some(high)) = (
            find_column(&header, &[LOW_COLUMN]),
            find_column(&header, &[HIGH_COLUMN]),
        ) {
            let series = new_series("Température min/max", TEMPERATURE_MIN_MAX.clone());
            columns.push(ColumnSeries::min_max(low, high, series));
        }
        if let Some(column) = find_column(&header, &[PRESSURE_COLUMN]) {
            let series = new_series("Pression", types.for_kind(TypeKind::Pressure, "hPa"));
            columns.push(ColumnSeries::single(column, series));
        }
        if let Some(column) = find_column(&header, &RAIN_COLUMNS) {
            let series_type = if header[column].ends_with("CM") {
                types.for_kind(TypeKind::Water, "cm")
            } else {
                WATER.clone()
            };
            columns.push(ColumnSeries::single(column, new_series("Précipitations", series_type)));
        }
        if columns.is_empty() {
            return Err(FileReadingError::head(path, line_of(&header), "no series column"));
        }

        let mut skipped = 0usize;
        for result in records {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("{}; line skipped", FileReadingError::body(path, line_of_error(&e), e.to_string()));
                    skipped += 1;
                    continue;
                }
            };
            let cell = record.get(date_column).unwrap_or("");
            let Some(date) = self.parse_date(cell) else {
                warn!("{}: skipping line {}: unreadable date '{}'", path.display(), line_of(&record), cell);
                skipped += 1;
                continue;
            };
            for column in &mut columns {
                column.push_record(path, &record, date, &self.config.null);
            }
        }

        let series: Vec<Series> = columns.into_iter().map(ColumnSeries::finish).collect();
        info!(
            "Read {} series from {} ({} lines skipped)",
            series.len(),
            path.display(),
            skipped
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_hourly_and_daily() {
        let reader = WundergroundReader::default();
        let hourly = vec![
            String::new(),
            "Time,TemperatureC,DewpointC,PressurehPa,HourlyPrecipMM,DateUTC<br>".to_string(),
        ];
        assert!(reader.sniff(Path::new("h.csv"), &hourly));
        let daily = vec!["Date,TemperatureHighC,TemperatureAvgC,TemperatureLowC,PrecipitationSumCM".to_string()];
        assert!(reader.sniff(Path::new("d.csv"), &daily));
        let other = vec!["Date,Value".to_string()];
        assert!(!reader.sniff(Path::new("o.csv"), &other));
    }

    #[test]
    fn test_clean_strips_breaks() {
        assert_eq!(clean("a,b<br>\n1,2<br>\n"), "a,b\n1,2\n");
    }
}
