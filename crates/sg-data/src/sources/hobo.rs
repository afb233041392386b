//! HOBOware CSV exports
//!
//! ```text
//! "Titre de tracé : Siphon"
//! "#","Date Heure, GMT+01:00","Pression abs, kPa (LGR S/N: 1)","Temp, °C (LGR S/N: 1)"
//! 1,13/02/20 14:30:00,101.325,12.1
//! ```

use std::path::Path;

use sg_core::types::{TypeKind, TypeRegistry, WATER};
use sg_core::{Item, Origin, Series};
use tracing::{debug, info, warn};

use super::{
    csv_reader, find_column, header_label, header_unit, line_of, line_of_error, read_text, ColumnSeries,
    DataFileReader,
};
use crate::config::ReaderConfig;
use crate::date_format::{DatePattern, Zone};
use crate::FileReadingError;

const TITLES: [&str; 2] = ["Plot Title", "Titre de tracé"];
const DATE_COLUMN: [&str; 1] = ["Date"];
const TIME_COLUMN: [&str; 2] = ["Heure", "Time"];
const PRESSURE_COLUMN: [&str; 2] = ["Pression", "Pressure"];
const TEMPERATURE_COLUMN: [&str; 1] = ["Temp"];
const RAIN_COLUMN: [&str; 3] = ["Pluvio", "Event", "Rain"];

pub struct HoboReader {
    config: ReaderConfig,
    patterns: Vec<DatePattern>,
}

impl HoboReader {
    pub fn new(config: ReaderConfig) -> Self {
        let patterns = config.hobo_date_formats.iter().map(DatePattern::new).collect();
        Self { config, patterns }
    }

    fn parse_date(&self, text: &str, zone: &Zone) -> Option<chrono::DateTime<chrono::Utc>> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.parse(text))
            .and_then(|local| zone.to_utc(&local))
    }
}

impl Default for HoboReader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

fn delimiter_of(line: &str) -> u8 {
    if line.contains(';') {
        b';'
    } else if line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

impl DataFileReader for HoboReader {
    fn name(&self) -> &'static str {
        "Hobo"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn sniff(&self, _path: &Path, first_lines: &[String]) -> bool {
        first_lines.iter().any(|line| {
            let line = line.trim_start_matches('"');
            TITLES.iter().any(|title| line.starts_with(title))
                || (line.contains("Date") && (line.contains("GMT") || line.starts_with('#')))
        })
    }

    fn read_file(&self, path: &Path, types: &TypeRegistry) -> Result<Vec<Series>, FileReadingError> {
        let text = read_text(path)?;
        let header_line = text.lines().find(|line| line.contains("Date")).unwrap_or("");
        let mut reader = csv_reader(&text, delimiter_of(header_line));
        let mut records = reader.records();

        let header = loop {
            match records.next() {
                Some(Ok(record)) if find_column(&record, &DATE_COLUMN).is_some() => break record,
                Some(Ok(record)) => debug!("Skipping line {} before the header", line_of(&record)),
                Some(Err(e)) => return Err(FileReadingError::head(path, line_of_error(&e), e.to_string())),
                None => return Err(FileReadingError::head(path, 0, "missing date column")),
            }
        };
        let header_line = line_of(&header);
        let date_column = find_column(&header, &DATE_COLUMN).unwrap_or(0);
        let time_column = find_column(&header, &TIME_COLUMN).unwrap_or(date_column);
        let zone = header
            .iter()
            .find_map(Zone::from_header)
            .unwrap_or_default();
        debug!(
            "{}: date column {}, time column {}, zone {}",
            path.display(),
            date_column,
            time_column,
            zone
        );

        let origin = Origin::new(path);
        let is_date = |column: usize| column == date_column || column == time_column;
        let mut columns = Vec::new();
        for (needles, kind) in [
            (&PRESSURE_COLUMN[..], TypeKind::Pressure),
            (&TEMPERATURE_COLUMN[..], TypeKind::Temperature),
        ] {
            let Some(column) = find_column(&header, needles).filter(|c| !is_date(*c)) else {
                continue;
            };
            let cell = &header[column];
            let series_type = match header_unit(cell) {
                Some(unit) => types.for_kind(kind, &unit),
                None => types.for_kind(kind, &kind.builtin().map(|t| t.unit.clone()).unwrap_or_default()),
            };
            let series = Series::new(header_label(cell), series_type).with_origin(origin.clone());
            columns.push(ColumnSeries::single(column, series));
        }
        let mut rain = find_column(&header, &RAIN_COLUMN)
            .filter(|c| !is_date(*c))
            .map(|column| {
                let series = Series::new(header_label(&header[column]), WATER.clone()).with_origin(origin.clone());
                ColumnSeries::single(column, series)
            });
        if columns.is_empty() && rain.is_none() {
            return Err(FileReadingError::head(path, header_line, "no series column"));
        }

        let mut parsed_rows = 0usize;
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
            let date_cell = record.get(date_column).unwrap_or("").trim();
            if date_cell.is_empty() {
                continue;
            }
            let date_text = if time_column == date_column {
                date_cell.to_string()
            } else {
                self.config.join(date_cell, record.get(time_column).unwrap_or(""))
            };
            let Some(date) = self.parse_date(&date_text, &zone) else {
                if parsed_rows == 0 {
                    return Err(FileReadingError::head(
                        path,
                        line_of(&record),
                        format!("date '{}' matches none of {:?}", date_text, self.config.hobo_date_formats),
                    ));
                }
                warn!("{}: skipping line {}: unreadable date '{}'", path.display(), line_of(&record), date_text);
                skipped += 1;
                continue;
            };
            parsed_rows += 1;

            for column in &mut columns {
                column.push_record(path, &record, date, &self.config.null);
            }
            if let Some(rain) = rain.as_mut() {
                let tipped = record
                    .get(rain.column)
                    .map(|cell| !self.config.null.is_null(cell))
                    .unwrap_or(false);
                if tipped {
                    rain.push(Item::new(date, self.config.hobo_rain_tip_mm));
                }
            }
        }

        let series: Vec<Series> = columns
            .into_iter()
            .chain(rain)
            .map(ColumnSeries::finish)
            .collect();
        info!(
            "Read {} series from {} ({} rows, {} skipped)",
            series.len(),
            path.display(),
            parsed_rows,
            skipped
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        let reader = HoboReader::default();
        let lines = vec![
            "\"Titre de tracé : Siphon\"".to_string(),
            "\"#\",\"Date Heure, GMT+01:00\",\"Temp, °C\"".to_string(),
        ];
        assert!(reader.sniff(Path::new("a.csv"), &lines));
        let weather = vec!["Time,TemperatureC,PressurehPa".to_string()];
        assert!(!reader.sniff(Path::new("b.csv"), &weather));
    }

    #[test]
    fn test_delimiter() {
        assert_eq!(delimiter_of("\"#\";\"Date Heure, GMT+01:00\""), b';');
        assert_eq!(delimiter_of("\"#\",\"Date Heure, GMT+01:00\""), b',');
    }
}
