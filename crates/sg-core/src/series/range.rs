use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive date interval covered by a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, swapping the bounds if needed
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Zero-length range at a single instant
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest range covering both
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Grow the range so that it covers `date`
    pub fn extend_to(&mut self, date: DateTime<Utc>) {
        if date < self.start {
            self.start = date;
        }
        if date > self.end {
            self.end = date;
        }
    }
}
