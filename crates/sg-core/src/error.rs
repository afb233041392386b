use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::series::SeriesId;

/// Errors raised by series operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("invalid item at {date} for series '{series}': expected a {expected} item")]
    InvalidItem {
        series: String,
        date: DateTime<Utc>,
        expected: ItemShape,
    },

    #[error("unknown series {0}")]
    UnknownSeries(SeriesId),
}

/// Value shape a series expects from its items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemShape {
    SingleValue,
    MinMax,
}

impl std::fmt::Display for ItemShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemShape::SingleValue => write!(f, "single-value"),
            ItemShape::MinMax => write!(f, "min/max"),
        }
    }
}

/// Errors raised by transforms
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("cannot compute: no item of '{target}' matches '{reference}' within the tolerance")]
    NoOverlap { reference: String, target: String },

    #[error("series '{series}' needs at least {required} items, it has {actual}")]
    NotEnoughItems {
        series: String,
        required: usize,
        actual: usize,
    },

    #[error("bucket length must be positive")]
    InvalidBucket,

    #[error("shifting '{series}' by {offset} moves dates out of range")]
    DateOutOfRange { series: String, offset: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}
