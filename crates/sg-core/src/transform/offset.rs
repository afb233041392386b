//! Time shifting and date-range limiting

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::TransformError;
use crate::series::{DateRange, Item, Series};

/// Unit of a time offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetUnit {
    Hour,
    Minute,
    Second,
}

impl OffsetUnit {
    pub fn millis(&self) -> i64 {
        match self {
            OffsetUnit::Hour => 3_600_000,
            OffsetUnit::Minute => 60_000,
            OffsetUnit::Second => 1_000,
        }
    }

    /// `amount` of this unit, `None` when it does not fit a duration
    pub fn duration(&self, amount: i64) -> Option<Duration> {
        amount
            .checked_mul(self.millis())
            .and_then(Duration::try_milliseconds)
    }
}

impl fmt::Display for OffsetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OffsetUnit::Hour => "hour",
            OffsetUnit::Minute => "minute",
            OffsetUnit::Second => "second",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OffsetUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "hour" | "hours" => Ok(OffsetUnit::Hour),
            "m" | "min" | "minute" | "minutes" => Ok(OffsetUnit::Minute),
            "s" | "sec" | "second" | "seconds" => Ok(OffsetUnit::Second),
            other => Err(format!("unknown offset unit '{}'", other)),
        }
    }
}

/// Items moved by `offset`; values are left untouched.
/// `None` when any date would leave the representable range.
pub fn offset_items(items: &[Item], offset: Duration) -> Option<Vec<Item>> {
    items.iter().map(|item| item.shifted_by(offset)).collect()
}

/// Items of `series` moved by `amount` of `unit`
pub(crate) fn shifted_items(series: &Series, amount: i64, unit: OffsetUnit) -> Result<Vec<Item>, TransformError> {
    unit.duration(amount)
        .and_then(|offset| offset_items(series.items(), offset))
        .ok_or_else(|| TransformError::DateOutOfRange {
            series: series.name().to_string(),
            offset: format!("{:+} {}", amount, unit),
        })
}

/// Shift every item date (and end date) of a series.
///
/// `applies_to_all` and `group` are recorded on the modification; callers
/// shifting every series of a file pass the same group to each of them.
pub fn apply_offset(
    series: &mut Series,
    amount: i64,
    unit: OffsetUnit,
    applies_to_all: bool,
    group: Uuid,
) -> Result<(), TransformError> {
    let shifted = shifted_items(series, amount, unit)?;
    series.set_items_with(shifted, &offset_label(amount, unit), applies_to_all, group)?;
    info!("Shifted '{}' by {} {}(s)", series.name(), amount, unit);
    Ok(())
}

pub(crate) fn offset_label(amount: i64, unit: OffsetUnit) -> String {
    format!("offset {:+} {}", amount, unit)
}

/// Keep only the items dated within `window`. Returns the number of items removed.
pub fn limit(series: &mut Series, window: DateRange) -> Result<usize, TransformError> {
    let kept = series.extract_sub_series(window.start, window.end);
    let removed = series.len() - kept.len();
    series.set_items(kept, "limit")?;
    info!("Limited '{}': {} items removed", series.name(), removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TEMPERATURE;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_one_hour_offset() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut series = Series::new("T", TEMPERATURE.clone());
        series.add_item(Item::new(start, 5.0)).unwrap();

        apply_offset(&mut series, 1, OffsetUnit::Hour, false, Uuid::new_v4()).unwrap();

        let item = &series.items()[0];
        assert_eq!(item.date, Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap());
        assert_eq!(item.value, Some(5.0));
        assert_eq!(series.undo_name(), Some("offset +1 hour"));
        assert!(!series.history().last_undo().unwrap().applies_to_all());
    }

    #[test]
    fn test_negative_offset_moves_end_dates() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut series = Series::new("T", TEMPERATURE.clone());
        series
            .add_item(Item::interval(start, start + Duration::minutes(10), 1.0))
            .unwrap();

        apply_offset(&mut series, -90, OffsetUnit::Second, true, Uuid::new_v4()).unwrap();

        let item = &series.items()[0];
        assert_eq!(item.date, start - Duration::seconds(90));
        assert_eq!(item.end_date, Some(start + Duration::seconds(510)));
        assert!(series.history().last_undo().unwrap().applies_to_all());
    }

    #[test]
    fn test_limit_keeps_window() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut series = Series::new("T", TEMPERATURE.clone());
        for i in 0..10 {
            series
                .add_item(Item::new(start + Duration::hours(i), i as f64))
                .unwrap();
        }

        let window = DateRange::new(start + Duration::hours(2), start + Duration::hours(4));
        assert_eq!(limit(&mut series, window).unwrap(), 7);
        assert_eq!(series.len(), 3);
        assert!(series.undo());
        assert_eq!(series.len(), 10);
    }

    #[test]
    fn test_extreme_offset_is_rejected() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut series = Series::new("T", TEMPERATURE.clone());
        series.add_item(Item::new(start, 5.0)).unwrap();

        for amount in [i64::MAX, 9_000_000_000_000] {
            let err = apply_offset(&mut series, amount, OffsetUnit::Hour, false, Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, TransformError::DateOutOfRange { .. }), "{}", err);
        }
        assert_eq!(series.items()[0].date, start);
        assert!(!series.can_undo());
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("hour".parse::<OffsetUnit>(), Ok(OffsetUnit::Hour));
        assert_eq!("MIN".parse::<OffsetUnit>(), Ok(OffsetUnit::Minute));
        assert_eq!("s".parse::<OffsetUnit>(), Ok(OffsetUnit::Second));
        assert!("day".parse::<OffsetUnit>().is_err());
    }
}
