//! Native `.speleo` format

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use sg_core::types::{SeriesType, TypeKind, TypeRegistry};
use sg_core::{DrawStyle, Origin, Series, SeriesStyle};
use tracing::{debug, info, warn};

use super::{csv_reader, line_of, line_of_error, read_text, ColumnSeries, DataFileReader};
use crate::config::{NullConfig, ReaderConfig};
use crate::date_format::{DatePattern, Zone};
use crate::FileReadingError;

pub const MAGIC: &str = "SpeleoGraph File";
pub(crate) const HEADERS: &str = "headers";
pub(crate) const DATA: &str = "data";
pub(crate) const EOF: &str = "eof";
pub(crate) const DATE: &str = "date";
pub(crate) const SPELEO_TYPE: &str = "sgt";
pub(crate) const USER_TYPE: &str = "ut";

/// Reader for files written by [`crate::writer::save`].
///
/// Only blank cells are missing data here; instrument sentinels from the
/// reader settings do not apply to values this crate wrote itself.
#[derive(Debug, Clone)]
pub struct SpeleoReader {
    config: ReaderConfig,
    null: NullConfig,
}

impl SpeleoReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            null: NullConfig::empty_cells_only(),
        }
    }
}

impl Default for SpeleoReader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

/// `"date";"<zone>";"<col>";"<pattern>"...`
struct DateSpec {
    zone: Zone,
    columns: Vec<usize>,
    pattern: DatePattern,
}

impl DateSpec {
    fn parse(record: &StringRecord, join: &str, path: &Path) -> Result<Self, FileReadingError> {
        let line = line_of(record);
        let fields: Vec<&str> = record.iter().map(str::trim).collect();
        if fields.len() < 4 || fields.len() % 2 != 0 {
            return Err(FileReadingError::head(path, line, "malformed date column declaration"));
        }
        let zone = Zone::parse(fields[1])
            .ok_or_else(|| FileReadingError::head(path, line, format!("unknown time zone '{}'", fields[1])))?;

        let mut columns = Vec::new();
        let mut patterns = Vec::new();
        for pair in fields[2..].chunks(2) {
            let column = pair[0]
                .parse::<usize>()
                .map_err(|_| FileReadingError::head(path, line, format!("bad date column '{}'", pair[0])))?;
            columns.push(column);
            patterns.push(pair[1]);
        }
        let pattern = DatePattern::new(patterns.join(format!("'{}'", join).as_str()));
        Ok(Self {
            zone,
            columns,
            pattern,
        })
    }

    fn date(&self, record: &StringRecord, join: &str) -> Option<DateTime<Utc>> {
        let mut parts = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            parts.push(record.get(*column)?.trim());
        }
        let local = self.pattern.parse(&parts.join(join))?;
        self.zone.to_utc(&local)
    }
}

/// `"<col>";"sgt"|"ut";...` followed by `key:value` tokens
struct SeriesSpec {
    column: usize,
    series_type: Arc<SeriesType>,
    name: String,
    min_max: bool,
    min: Option<usize>,
    max: Option<usize>,
    show: bool,
    color: Option<i32>,
    style: Option<DrawStyle>,
    stepped: bool,
}

impl SeriesSpec {
    fn parse(record: &StringRecord, types: &TypeRegistry, path: &Path) -> Result<Self, FileReadingError> {
        let line = line_of(record);
        let head = |message: String| FileReadingError::head(path, line, message);
        let fields: Vec<&str> = record.iter().map(str::trim).collect();
        if fields.len() < 3 {
            return Err(head("malformed series declaration".to_string()));
        }
        let column = fields[0]
            .parse::<usize>()
            .map_err(|_| head(format!("bad series column '{}'", fields[0])))?;

        let (series_type, name, tokens) = match fields[1] {
            SPELEO_TYPE => {
                let series_type = TypeKind::from_token(fields[2])
                    .and_then(|kind| kind.builtin())
                    .ok_or_else(|| head(format!("unknown series type '{}'", fields[2])))?;
                let name = series_type.name.clone();
                (series_type, name, &fields[3..])
            }
            USER_TYPE => {
                let unit = fields
                    .get(3)
                    .ok_or_else(|| head("user type without unit".to_string()))?;
                (types.resolve(fields[2], unit), fields[2].to_string(), &fields[4..])
            }
            other => return Err(head(format!("unknown declaration '{}'", other))),
        };

        let mut spec = SeriesSpec {
            column,
            series_type,
            name,
            min_max: false,
            min: None,
            max: None,
            show: false,
            color: None,
            style: None,
            stepped: false,
        };
        for token in tokens {
            let Some((key, value)) = token.split_once(':') else {
                debug!("Ignoring token '{}' at line {}", token, line);
                continue;
            };
            let column = || {
                value
                    .parse::<usize>()
                    .map_err(|_| head(format!("bad column in '{}'", token)))
            };
            match key {
                "min-max" => spec.min_max = value == "1",
                "min" => spec.min = Some(column()?),
                "max" => spec.max = Some(column()?),
                "show" => spec.show = value == "1",
                "color" => {
                    spec.color = Some(value.parse::<i32>().map_err(|_| head(format!("bad color '{}'", value)))?)
                }
                "stepped" => spec.stepped = value == "1",
                "style" => spec.style = DrawStyle::from_name(value),
                "name" => spec.name = value.to_string(),
                _ => debug!("Ignoring token '{}' at line {}", token, line),
            }
        }
        Ok(spec)
    }

    fn into_column(self, origin: &Origin) -> ColumnSeries {
        let min_max = self.min_max || self.series_type.high_low;
        let draw = self
            .style
            .unwrap_or(if self.stepped { DrawStyle::Step } else { DrawStyle::default() });
        let series = Series::new(self.name, self.series_type)
            .with_origin(origin.clone())
            .with_min_max(min_max)
            .with_show(self.show)
            .with_style(SeriesStyle {
                color: self.color,
                draw,
            });
        if min_max {
            let low = self.min.unwrap_or(self.column);
            ColumnSeries::min_max(low, self.max.unwrap_or(low + 1), series)
        } else {
            ColumnSeries::single(self.column, series)
        }
    }
}

fn first_cell(record: &StringRecord) -> &str {
    record.get(0).map(str::trim).unwrap_or("")
}

impl DataFileReader for SpeleoReader {
    fn name(&self) -> &'static str {
        "SpeleoGraph"
    }

    fn extension(&self) -> &'static str {
        "speleo"
    }

    fn sniff(&self, _path: &Path, first_lines: &[String]) -> bool {
        first_lines
            .first()
            .map(|line| line.trim().trim_matches('"') == MAGIC)
            .unwrap_or(false)
    }

    fn read_file(&self, path: &Path, types: &TypeRegistry) -> Result<Vec<Series>, FileReadingError> {
        let text = read_text(path)?;
        let mut reader = csv_reader(&text, b';');
        let mut records = reader.records();
        let mut next = |expected: &str| -> Result<StringRecord, FileReadingError> {
            match records.next() {
                Some(Ok(record)) => Ok(record),
                Some(Err(e)) => Err(FileReadingError::head(path, line_of_error(&e), e.to_string())),
                None => Err(FileReadingError::head(path, 0, format!("missing {}", expected))),
            }
        };

        let magic = next("file header")?;
        if first_cell(&magic) != MAGIC {
            return Err(FileReadingError::head(path, line_of(&magic), "not a SpeleoGraph file"));
        }
        let headers = next(HEADERS)?;
        if first_cell(&headers) != HEADERS {
            return Err(FileReadingError::head(
                path,
                line_of(&headers),
                format!("expected '{}'", HEADERS),
            ));
        }

        let mut date_spec = None;
        let mut specs = Vec::new();
        loop {
            let record = next(DATA)?;
            match first_cell(&record) {
                DATA => break,
                DATE => date_spec = Some(DateSpec::parse(&record, &self.config.date_join, path)?),
                _ => specs.push(SeriesSpec::parse(&record, types, path)?),
            }
        }
        let date_spec = date_spec.ok_or_else(|| FileReadingError::head(path, 0, "missing date column"))?;

        let origin = Origin::new(path);
        let mut columns: Vec<ColumnSeries> = specs.into_iter().map(|s| s.into_column(&origin)).collect();
        let mut terminated = false;
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
            if first_cell(&record) == EOF {
                terminated = true;
                break;
            }
            let Some(date) = date_spec.date(&record, &self.config.date_join) else {
                warn!("{}: skipping line {}: unreadable date", path.display(), line_of(&record));
                skipped += 1;
                continue;
            };
            for column in &mut columns {
                column.push_record(path, &record, date, &self.null);
            }
        }
        if !terminated {
            warn!("{}: missing '{}' marker", path.display(), EOF);
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
