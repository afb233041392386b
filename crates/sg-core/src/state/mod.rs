use std::sync::Arc;

use chrono::Duration;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::TransformError;
use crate::events::EventBus;
use crate::repository::{SeriesHandle, SeriesRepository};
use crate::series::{DateRange, SeriesId};
use crate::settings::Settings;
use crate::transform::{self, OffsetUnit};
use crate::types::TypeRegistry;

/// The main application state
pub struct AppState {
    /// Every live series
    pub repository: Arc<SeriesRepository>,

    /// Built-in and user-defined series types
    pub types: Arc<TypeRegistry>,

    /// The event bus
    pub event_bus: Arc<EventBus>,

    /// Application settings
    pub settings: Arc<RwLock<Settings>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl AppState {
    /// Create a new application state
    pub fn new(settings: Settings) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let repository = SeriesRepository::new(event_bus.clone())
            .with_history_capacity(settings.history.capacity);

        Self {
            repository: Arc::new(repository),
            types: Arc::new(TypeRegistry::new()),
            event_bus,
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    fn tolerance(&self) -> Duration {
        self.settings.read().tolerance()
    }

    /// Recalibrate `target` against `reference` over `window`.
    /// Returns the offset removed from the target.
    pub fn recalibrate(
        &self,
        reference: SeriesId,
        target: SeriesId,
        window: DateRange,
    ) -> Result<f64, TransformError> {
        let (reference_name, reference_items) = {
            let reference = self.repository.require(reference)?;
            let series = reference.read();
            (
                series.name().to_string(),
                series.extract_sub_series(window.start, window.end),
            )
        };
        let target = self.repository.require(target)?;
        let mut target = target.write();
        transform::recalibrate_against(&reference_name, &reference_items, &mut target, window, self.tolerance())
    }

    /// Derive and register a water height series
    pub fn water_height(&self, standard: SeriesId, target: SeriesId) -> Result<SeriesHandle, TransformError> {
        let standard = self.repository.require(standard)?;
        let target = self.repository.require(target)?;
        let multiplier = self.settings.read().water_height.multiplier;
        let heights = transform::water_height(&standard.read(), &target.read(), self.tolerance(), multiplier)?;
        Ok(self.repository.add(heights))
    }

    /// Derive and register the running sum of a series
    pub fn cumulate(&self, id: SeriesId) -> Result<SeriesHandle, TransformError> {
        let source = self.repository.require(id)?;
        let cumulated = transform::cumulate(&source.read())?;
        Ok(self.repository.add(cumulated))
    }

    /// Derive and register a resampled series
    pub fn resample(&self, id: SeriesId, bucket: Duration) -> Result<SeriesHandle, TransformError> {
        let source = self.repository.require(id)?;
        let resampled = transform::resample(&source.read(), bucket)?;
        Ok(self.repository.add(resampled))
    }

    /// Shift a series in time, or every series of its file when `all` is set.
    /// Returns the number of series shifted.
    pub fn shift(&self, id: SeriesId, amount: i64, unit: OffsetUnit, all: bool) -> Result<usize, TransformError> {
        if all {
            return self.repository.apply_offset_to_origin(id, amount, unit);
        }
        let handle = self.repository.require(id)?;
        transform::apply_offset(&mut handle.write(), amount, unit, false, Uuid::new_v4())?;
        Ok(1)
    }

    /// Keep only the items within `window`, on one series or its whole file.
    /// Returns the number of series limited.
    pub fn limit(&self, id: SeriesId, window: DateRange, all: bool) -> Result<usize, TransformError> {
        if all {
            return self.repository.limit_origin(id, window);
        }
        let handle = self.repository.require(id)?;
        let removed = transform::limit(&mut handle.write(), window)?;
        info!("{} items outside {} .. {}", removed, window.start, window.end);
        Ok(1)
    }
}
