//! File readers
//!
//! Each instrument dialect is a [`DataFileReader`]. The [`ReaderRegistry`]
//! picks the reader able to handle a file by sniffing its first lines.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use sg_core::types::TypeRegistry;
use sg_core::{Item, Series};
use tracing::warn;

use crate::config::NullConfig;
use crate::FileReadingError;

pub mod hobo;
pub mod reefnet;
pub mod registry;
pub mod speleo;
pub mod wunderground;

pub use hobo::HoboReader;
pub use reefnet::ReefnetReader;
pub use registry::{LoadedFile, ReaderRegistry};
pub use speleo::SpeleoReader;
pub use wunderground::WundergroundReader;

/// Number of leading lines handed to [`DataFileReader::sniff`]
pub const SNIFF_LINES: usize = 30;

/// A file dialect
pub trait DataFileReader: Send + Sync {
    /// Human readable dialect name
    fn name(&self) -> &'static str;

    /// Usual file extension, without the dot
    fn extension(&self) -> &'static str;

    /// Whether this reader recognizes the file from its first lines
    fn sniff(&self, path: &Path, first_lines: &[String]) -> bool;

    /// Parse every series the file holds
    fn read_file(&self, path: &Path, types: &TypeRegistry) -> Result<Vec<Series>, FileReadingError>;
}

/// File contents as text. Invalid UTF-8 is replaced and a BOM dropped.
pub(crate) fn read_text(path: &Path) -> Result<String, FileReadingError> {
    let bytes = fs::read(path).map_err(|e| FileReadingError::head(path, 0, e.to_string()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

pub(crate) fn first_lines(text: &str, count: usize) -> Vec<String> {
    text.lines().take(count).map(str::to_string).collect()
}

/// Headerless, flexible CSV reader over `text`
pub(crate) fn csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes())
}

/// 1-based line of a record
pub(crate) fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

pub(crate) fn line_of_error(error: &csv::Error) -> u64 {
    error.position().map(|p| p.line()).unwrap_or(0)
}

/// First cell containing any of `needles`
pub(crate) fn find_column(header: &StringRecord, needles: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|cell| needles.iter().any(|needle| cell.contains(needle)))
}

/// Unit written in a header cell: `Pression abs, kPa (LGR S/N: 1)` gives `kPa`
pub(crate) fn header_unit(cell: &str) -> Option<String> {
    let (_, rest) = cell.split_once(", ")?;
    let unit = rest.split(" (").next().unwrap_or(rest).trim();
    (!unit.is_empty()).then(|| unit.to_string())
}

/// Header cell text before the unit
pub(crate) fn header_label(cell: &str) -> &str {
    cell.split(", ").next().unwrap_or(cell).trim()
}

/// A series being filled from one or two columns
pub(crate) struct ColumnSeries {
    pub column: usize,
    /// Second column of a min/max series
    pub high: Option<usize>,
    pub series: Series,
    items: Vec<Item>,
}

impl ColumnSeries {
    pub fn single(column: usize, series: Series) -> Self {
        Self {
            column,
            high: None,
            series,
            items: Vec::new(),
        }
    }

    pub fn min_max(low: usize, high: usize, series: Series) -> Self {
        Self {
            column: low,
            high: Some(high),
            series,
            items: Vec::new(),
        }
    }

    /// Add the item held by `record` at `date`. Null cells add nothing;
    /// unreadable cells add nothing either and are logged as value errors.
    pub fn push_record(&mut self, path: &Path, record: &StringRecord, date: DateTime<Utc>, null: &NullConfig) {
        let value = |column: usize| {
            let cell = record.get(column)?;
            if null.is_null(cell) {
                return None;
            }
            let value = null.parse_value(cell);
            if value.is_none() {
                let message = format!("unreadable value '{}' in column {}", cell, column);
                warn!("{}", FileReadingError::value(path, line_of(record), message));
            }
            value
        };
        let item = match self.high {
            None => value(self.column).map(|v| Item::new(date, v)),
            Some(high) => match (value(self.column), value(high)) {
                (Some(low), Some(high)) => Some(Item::min_max(date, low, high)),
                _ => None,
            },
        };
        if let Some(item) = item {
            self.items.push(item);
        }
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    /// The filled series, sorted by date
    pub fn finish(mut self) -> Series {
        let rejected = self.series.extend_items(self.items);
        if rejected > 0 {
            warn!("Series '{}': {} items rejected", self.series.name(), rejected);
        }
        self.series.order_by_date();
        self.series
    }
}
