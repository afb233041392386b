//! Core data model for cave monitoring time series
//!
//! This crate provides series, their types and undo history, the series
//! repository and the corrective transforms applied to recorded data.

pub mod error;
pub mod events;
pub mod repository;
pub mod series;
pub mod settings;
pub mod state;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use error::{ItemShape, SeriesError, TransformError};
pub use events::EventBus;
pub use repository::{SeriesHandle, SeriesRepository};
pub use series::{
    Bounds, ChangeReason, DateRange, DrawStyle, History, Item, Items, Modification, Origin, Series,
    SeriesId, SeriesListener, SeriesStyle,
};
pub use settings::{Settings, SettingsError};
pub use state::AppState;
pub use types::{SeriesType, TypeKind, TypeRegistry};
