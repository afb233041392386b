//! Native `.speleo` writer

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::{QuoteStyle, WriterBuilder};
use sg_core::{DrawStyle, Series};
use tracing::info;

use crate::date_format::{DatePattern, Zone};
use crate::sources::speleo::{DATA, DATE, EOF, HEADERS, MAGIC, SPELEO_TYPE, USER_TYPE};
use crate::WriteError;

pub const NATIVE_EXTENSION: &str = "speleo";

/// Date pattern of the date column
pub const DATE_PATTERN: &str = "dd/MM/yyyy HH:mm:ss";

/// `path` with the native extension, added when missing
pub fn native_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == NATIVE_EXTENSION => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(NATIVE_EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Write `series` to `path` in the native format and return the path written.
///
/// Column 0 holds the date in UTC; then each series takes one column, or two
/// (min then max) for min/max series. Rows are in ascending date order;
/// a date a series repeats gets one row per repetition.
pub fn save(path: &Path, series: &[&Series]) -> Result<PathBuf, WriteError> {
    if series.is_empty() {
        return Err(WriteError::NothingToSave);
    }
    let path = native_path(path);
    let file = File::create(&path)?;
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Always)
        .flexible(true)
        .from_writer(BufWriter::new(file));

    writer.write_record([MAGIC])?;
    writer.write_record([HEADERS])?;
    let zone = Zone::Utc.to_string();
    writer.write_record([DATE, zone.as_str(), "0", DATE_PATTERN])?;

    let mut column = 1;
    let mut columns = Vec::with_capacity(series.len());
    for s in series {
        writer.write_record(header_record(s, column))?;
        columns.push(column);
        column += if s.is_min_max() { 2 } else { 1 };
    }
    let width = column;

    writer.write_record([DATA])?;
    let pattern = DatePattern::new(DATE_PATTERN);
    for ((date, _), row) in rows(series, &columns, width) {
        let mut record = row;
        record[0] = pattern.format(&date.naive_utc());
        writer.write_record(&record)?;
    }
    writer.write_record([EOF])?;

    let mut inner = writer
        .into_inner()
        .map_err(|e| WriteError::Io(std::io::Error::new(e.error().kind(), e.to_string())))?;
    inner.flush()?;

    info!("Saved {} series to {}", series.len(), path.display());
    Ok(path)
}

fn header_record(series: &Series, column: usize) -> Vec<String> {
    let series_type = series.series_type();
    let mut record = vec![column.to_string()];
    if series_type.is_builtin() {
        record.push(SPELEO_TYPE.to_string());
        record.push(series_type.kind.token().to_string());
    } else {
        record.push(USER_TYPE.to_string());
        record.push(series_type.name.clone());
        record.push(series_type.unit.clone());
    }
    if series.is_min_max() {
        record.push("min-max:1".to_string());
        record.push(format!("min:{}", column));
        record.push(format!("max:{}", column + 1));
    }
    if series.is_shown() {
        record.push("show:1".to_string());
    }
    let style = series.style();
    if let Some(color) = style.color {
        record.push(format!("color:{}", color));
    }
    if style.draw != DrawStyle::default() {
        record.push(format!("style:{}", style.draw.name()));
    }
    record.push(format!("name:{}", series.name()));
    record
}

/// Rows of cells keyed by date and by the rank of the item among the items
/// of its series sharing that date
fn rows(series: &[&Series], columns: &[usize], width: usize) -> BTreeMap<(DateTime<Utc>, usize), Vec<String>> {
    let mut rows: BTreeMap<(DateTime<Utc>, usize), Vec<String>> = BTreeMap::new();
    for (s, &column) in series.iter().zip(columns) {
        let mut seen: HashMap<DateTime<Utc>, usize> = HashMap::new();
        for item in s.items() {
            let rank = seen.entry(item.date).or_insert(0);
            let key = (item.date, *rank);
            *rank += 1;
            let row = rows
                .entry(key)
                .or_insert_with(|| vec![String::new(); width]);
            match (s.is_min_max(), item.bounds) {
                (true, Some(bounds)) => {
                    row[column] = bounds.low.to_string();
                    row[column + 1] = bounds.high.to_string();
                }
                (false, _) => {
                    if let Some(value) = item.value.filter(|v| !v.is_nan()) {
                        row[column] = value.to_string();
                    }
                }
                (true, None) => {}
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_path() {
        assert_eq!(native_path(Path::new("out")), PathBuf::from("out.speleo"));
        assert_eq!(native_path(Path::new("out.speleo")), PathBuf::from("out.speleo"));
        assert_eq!(native_path(Path::new("cave.csv")), PathBuf::from("cave.csv.speleo"));
    }

    #[test]
    fn test_nothing_to_save() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            save(&dir.path().join("empty"), &[]),
            Err(WriteError::NothingToSave)
        ));
    }
}
