//! Single time-stamped observations

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Low/high pair carried by min-max items
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn shifted(self, delta: f64) -> Self {
        Self {
            low: self.low + delta,
            high: self.high + delta,
        }
    }
}

/// One observation of a series.
///
/// An item holds either a scalar `value`, a `bounds` pair, or both when the
/// source file supplies all three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub bounds: Option<Bounds>,
}

impl Item {
    /// Create a single-value item
    pub fn new(date: DateTime<Utc>, value: f64) -> Self {
        Self {
            date,
            end_date: None,
            value: Some(value),
            bounds: None,
        }
    }

    /// Create a low/high item
    pub fn min_max(date: DateTime<Utc>, low: f64, high: f64) -> Self {
        Self {
            date,
            end_date: None,
            value: None,
            bounds: Some(Bounds::new(low, high)),
        }
    }

    /// Create an interval item covering `[date, end_date]`.
    ///
    /// The dates are swapped when given in reverse order so that
    /// `end_date >= date` always holds.
    pub fn interval(date: DateTime<Utc>, end_date: DateTime<Utc>, value: f64) -> Self {
        let (date, end_date) = if end_date < date {
            (end_date, date)
        } else {
            (date, end_date)
        };
        Self {
            date,
            end_date: Some(end_date),
            value: Some(value),
            bounds: None,
        }
    }

    /// Attach a low/high pair to an existing item
    pub fn with_bounds(mut self, low: f64, high: f64) -> Self {
        self.bounds = Some(Bounds::new(low, high));
        self
    }

    /// Whether the item carries a low/high pair
    pub fn is_min_max(&self) -> bool {
        self.bounds.is_some()
    }

    /// Whether the item carries a usable scalar value
    pub fn has_value(&self) -> bool {
        self.value.map(|v| !v.is_nan()).unwrap_or(false)
    }

    /// Last instant covered by this item
    pub fn last_date(&self) -> DateTime<Utc> {
        self.end_date.unwrap_or(self.date)
    }

    /// Scalar value, or the middle of the bounds when only a pair is present
    pub fn representative_value(&self) -> Option<f64> {
        match (self.value, self.bounds) {
            (Some(v), _) if !v.is_nan() => Some(v),
            (_, Some(b)) => Some((b.low + b.high) / 2.0),
            _ => None,
        }
    }

    /// Copy of this item moved in time, values untouched.
    /// `None` when a shifted date falls outside the representable range.
    pub fn shifted_by(&self, offset: Duration) -> Option<Self> {
        let end_date = match self.end_date {
            Some(end) => Some(end.checked_add_signed(offset)?),
            None => None,
        };
        Some(Self {
            date: self.date.checked_add_signed(offset)?,
            end_date,
            value: self.value,
            bounds: self.bounds,
        })
    }

    /// Copy of this item with `delta` added to every value it carries
    pub fn with_value_delta(&self, delta: f64) -> Self {
        Self {
            date: self.date,
            end_date: self.end_date,
            value: self.value.map(|v| v + delta),
            bounds: self.bounds.map(|b| b.shifted(delta)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_interval_keeps_end_after_start() {
        let item = Item::interval(at(100), at(40), 3.0);
        assert_eq!(item.date, at(40));
        assert_eq!(item.end_date, Some(at(100)));
        assert_eq!(item.last_date(), at(100));
    }

    #[test]
    fn test_shift_moves_both_dates() {
        let item = Item::interval(at(0), at(60), 1.5)
            .shifted_by(Duration::hours(1))
            .unwrap();
        assert_eq!(item.date, at(3600));
        assert_eq!(item.end_date, Some(at(3660)));
        assert_eq!(item.value, Some(1.5));
    }

    #[test]
    fn test_shift_past_max_date() {
        let item = Item::new(DateTime::<Utc>::MAX_UTC - Duration::days(1), 1.0);
        assert!(item.shifted_by(Duration::days(2)).is_none());
        assert!(item.shifted_by(Duration::hours(1)).is_some());
    }

    #[test]
    fn test_value_delta_applies_to_bounds() {
        let item = Item::min_max(at(0), 2.0, 6.0).with_value_delta(-1.0);
        assert_eq!(item.bounds, Some(Bounds::new(1.0, 5.0)));
        assert_eq!(item.value, None);
        assert_eq!(item.representative_value(), Some(3.0));
    }

    #[test]
    fn test_nan_is_not_a_value() {
        let item = Item::new(at(0), f64::NAN);
        assert!(!item.has_value());
        assert_eq!(item.representative_value(), None);
    }
}
