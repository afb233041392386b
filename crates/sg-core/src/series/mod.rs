//! Series of time-stamped items
//!
//! A [`Series`] owns an ordered item sequence, the [`History`] of snapshots
//! that makes every content change undoable, and the weak list of listeners
//! notified on each change.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ItemShape, SeriesError};
use crate::types::SeriesType;

mod history;
mod item;
mod listener;
mod range;

pub use history::{History, Modification, DEFAULT_HISTORY_CAPACITY};
pub use item::{Bounds, Item};
pub use listener::{ChangeReason, SeriesListener};
pub use range::DateRange;

/// Series identifier type
pub type SeriesId = Uuid;

/// Shared, immutable snapshot of an item sequence
pub type Items = Arc<Vec<Item>>;

/// File a series was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin(PathBuf);

impl Origin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Get the file name
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// How the view layer draws a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawStyle {
    #[default]
    Line,
    Step,
    Area,
    Points,
    Bars,
}

impl DrawStyle {
    pub fn name(&self) -> &'static str {
        match self {
            DrawStyle::Line => "line",
            DrawStyle::Step => "step",
            DrawStyle::Area => "area",
            DrawStyle::Points => "points",
            DrawStyle::Bars => "bars",
        }
    }

    pub fn from_name(name: &str) -> Option<DrawStyle> {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => Some(DrawStyle::Line),
            "step" => Some(DrawStyle::Step),
            "area" => Some(DrawStyle::Area),
            "points" => Some(DrawStyle::Points),
            "bars" => Some(DrawStyle::Bars),
            _ => None,
        }
    }
}

/// Visual attributes, opaque to transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesStyle {
    /// Packed RGB color
    pub color: Option<i32>,
    pub draw: DrawStyle,
}

/// A typed, time-ordered collection of observations from one instrument column
pub struct Series {
    id: SeriesId,
    origin: Option<Origin>,
    name: String,
    series_type: Arc<SeriesType>,
    items: Items,
    show: bool,
    min_max: bool,
    style: SeriesStyle,
    history: History,
    /// Cached `[min date, max date]`, `None` when stale
    range_cache: Option<DateRange>,
    listeners: Vec<Weak<dyn SeriesListener>>,
}

impl Series {
    /// Create an empty series. Min/max mode follows the type's `high_low` flag.
    pub fn new(name: impl Into<String>, series_type: Arc<SeriesType>) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin: None,
            name: name.into(),
            min_max: series_type.high_low,
            series_type,
            items: Arc::new(Vec::new()),
            show: true,
            style: SeriesStyle::default(),
            history: History::default(),
            range_cache: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_min_max(mut self, min_max: bool) -> Self {
        self.min_max = min_max;
        self
    }

    pub fn with_style(mut self, style: SeriesStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history.set_capacity(capacity);
        self
    }

    /// Empty series sharing this one's origin, min/max mode and style
    pub fn derived(&self, name: impl Into<String>, series_type: Arc<SeriesType>) -> Series {
        let mut derived = Series::new(name, series_type)
            .with_style(self.style)
            .with_history_capacity(self.history.capacity());
        derived.origin = self.origin.clone();
        derived
    }

    pub fn id(&self) -> SeriesId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.notify(ChangeReason::Style);
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn series_type(&self) -> &Arc<SeriesType> {
        &self.series_type
    }

    pub fn set_type(&mut self, series_type: Arc<SeriesType>) {
        self.series_type = series_type;
        self.notify(ChangeReason::Type);
    }

    pub fn is_shown(&self) -> bool {
        self.show
    }

    pub fn set_show(&mut self, show: bool) {
        if self.show != show {
            self.show = show;
            self.notify(ChangeReason::Shown);
        }
    }

    pub fn is_min_max(&self) -> bool {
        self.min_max
    }

    pub fn style(&self) -> SeriesStyle {
        self.style
    }

    pub fn set_style(&mut self, style: SeriesStyle) {
        self.style = style;
        self.notify(ChangeReason::Style);
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Shared handle on the current items
    pub fn snapshot(&self) -> Items {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check that an item has the value shape this series expects
    pub fn validate(&self, item: &Item) -> Result<(), SeriesError> {
        let valid = if self.min_max {
            item.is_min_max()
        } else {
            item.value.is_some()
        };
        if valid {
            Ok(())
        } else {
            Err(SeriesError::InvalidItem {
                series: self.name.clone(),
                date: item.date,
                expected: self.expected_shape(),
            })
        }
    }

    fn expected_shape(&self) -> ItemShape {
        if self.min_max {
            ItemShape::MinMax
        } else {
            ItemShape::SingleValue
        }
    }

    /// Append an item without sorting
    pub fn add_item(&mut self, item: Item) -> Result<(), SeriesError> {
        self.validate(&item)?;
        if let Some(range) = self.range_cache.as_mut() {
            range.extend_to(item.date);
            range.extend_to(item.last_date());
        }
        Arc::make_mut(&mut self.items).push(item);
        self.notify(ChangeReason::Content);
        Ok(())
    }

    /// Append every valid item, logging and skipping the others.
    /// Returns the number of rejected items.
    pub fn extend_items(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
        let mut rejected = 0;
        let mut accepted = Vec::new();
        for item in items {
            match self.validate(&item) {
                Ok(()) => accepted.push(item),
                Err(e) => {
                    warn!("Skipping item: {}", e);
                    rejected += 1;
                }
            }
        }
        if !accepted.is_empty() {
            Arc::make_mut(&mut self.items).extend(accepted);
            self.range_cache = None;
            self.notify(ChangeReason::Content);
        }
        rejected
    }

    /// `[min date, max date]` over the items, using `end_date` when present.
    /// An empty series yields a zero-length range at the current instant.
    pub fn range(&mut self) -> DateRange {
        if let Some(range) = self.range_cache {
            return range;
        }
        match Self::compute_range(&self.items) {
            Some(range) => {
                self.range_cache = Some(range);
                range
            }
            None => DateRange::instant(Utc::now()),
        }
    }

    /// Same as [`Series::range`] without touching the cache
    pub fn current_range(&self) -> DateRange {
        self.range_cache
            .or_else(|| Self::compute_range(&self.items))
            .unwrap_or_else(|| DateRange::instant(Utc::now()))
    }

    fn compute_range(items: &[Item]) -> Option<DateRange> {
        let first = items.first()?;
        let mut range = DateRange::instant(first.date);
        for item in items {
            range.extend_to(item.date);
            range.extend_to(item.last_date());
        }
        Some(range)
    }

    /// Stable sort of the items by date
    pub fn order_by_date(&mut self) {
        if self.is_sorted() {
            return;
        }
        Arc::make_mut(&mut self.items).sort_by_key(|item| item.date);
        self.notify(ChangeReason::Content);
    }

    pub fn is_sorted(&self) -> bool {
        self.items.windows(2).all(|w| w[0].date <= w[1].date)
    }

    /// Items dated within `[start, end]`, sorted by date
    pub fn extract_sub_series(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Item> {
        let mut sub: Vec<Item> = self
            .items
            .iter()
            .filter(|item| item.date >= start && item.date <= end)
            .cloned()
            .collect();
        sub.sort_by_key(|item| item.date);
        sub
    }

    /// Record the current items under `label` and replace them.
    ///
    /// Every content-changing operation goes through here so that it can be undone.
    pub fn set_items(&mut self, items: Vec<Item>, label: &str) -> Result<(), SeriesError> {
        self.set_items_with(items, label, false, Uuid::new_v4())
    }

    /// [`Series::set_items`] for modifications applied to several series at once
    pub fn set_items_with(
        &mut self,
        items: Vec<Item>,
        label: &str,
        applies_to_all: bool,
        group: Uuid,
    ) -> Result<(), SeriesError> {
        for item in &items {
            self.validate(item)?;
        }
        let previous = std::mem::replace(&mut self.items, Arc::new(items));
        self.history
            .push(Modification::new(self.id, label, previous, applies_to_all, group));
        self.range_cache = None;
        debug!("Series '{}': {} ({} items)", self.name, label, self.items.len());
        self.notify(ChangeReason::Content);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Label of the modification `undo` would revert
    pub fn undo_name(&self) -> Option<&str> {
        self.history.last_undo().map(|m| m.name())
    }

    /// Label of the modification `redo` would replay
    pub fn redo_name(&self) -> Option<&str> {
        self.history.last_redo().map(|m| m.name())
    }

    /// Restore the items recorded by the last modification.
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.items.clone()) {
            Some(items) => {
                self.restore(items);
                true
            }
            None => false,
        }
    }

    /// Replay the last undone modification.
    /// Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.items.clone()) {
            Some(items) => {
                self.restore(items);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, items: Items) {
        self.items = items;
        self.range_cache = None;
        self.notify(ChangeReason::Content);
    }

    /// Subscribe a listener. Only a weak reference is kept.
    pub fn add_listener(&mut self, listener: &Arc<dyn SeriesListener>) {
        self.listeners.push(Arc::downgrade(listener));
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn SeriesListener>) {
        let target = Arc::downgrade(listener);
        self.listeners.retain(|weak| !Weak::ptr_eq(weak, &target));
    }

    /// Detach every listener
    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Notify all listeners of a change
    fn notify(&mut self, reason: ChangeReason) {
        // Remove any dead weak references
        self.listeners.retain(|weak| weak.strong_count() > 0);

        let listeners: Vec<_> = self.listeners.iter().filter_map(Weak::upgrade).collect();
        for listener in listeners {
            listener.on_series_change(self, reason);
        }
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("type", &self.series_type.name)
            .field("items", &self.items.len())
            .field("show", &self.show)
            .field("min_max", &self.min_max)
            .finish()
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{} [{}]", self.name, origin),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PRESSURE, TEMPERATURE_MIN_MAX};
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_577_836_800 + secs, 0).unwrap()
    }

    fn series_with(values: &[(i64, f64)]) -> Series {
        let mut series = Series::new("P1", PRESSURE.clone());
        for (t, v) in values {
            series.add_item(Item::new(at(*t), *v)).unwrap();
        }
        series
    }

    #[derive(Default)]
    struct Recorder {
        reasons: Mutex<Vec<ChangeReason>>,
    }

    impl SeriesListener for Recorder {
        fn on_series_change(&self, _series: &Series, reason: ChangeReason) {
            self.reasons.lock().push(reason);
        }
    }

    #[test]
    fn test_add_item_rejects_wrong_shape() {
        let mut series = Series::new("T", TEMPERATURE_MIN_MAX.clone());
        assert!(series.is_min_max());
        let err = series.add_item(Item::new(at(0), 1.0)).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::InvalidItem { expected: ItemShape::MinMax, .. }
        ));
        series.add_item(Item::min_max(at(0), 1.0, 2.0)).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_extend_items_skips_invalid() {
        let mut series = Series::new("P", PRESSURE.clone());
        let rejected = series.extend_items(vec![
            Item::new(at(0), 1.0),
            Item::min_max(at(60), 1.0, 2.0),
            Item::new(at(120), 3.0),
        ]);
        assert_eq!(rejected, 1);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_range_uses_end_date() {
        let mut series = series_with(&[(60, 1.0), (0, 2.0)]);
        series
            .add_item(Item::interval(at(120), at(600), 3.0))
            .unwrap();
        let range = series.range();
        assert_eq!(range.start, at(0));
        assert_eq!(range.end, at(600));
    }

    #[test]
    fn test_empty_range_is_degenerate() {
        let mut series = Series::new("P", PRESSURE.clone());
        assert!(series.range().is_empty());
    }

    #[test]
    fn test_range_cache_invalidated_by_set_items() {
        let mut series = series_with(&[(0, 1.0), (60, 2.0)]);
        assert_eq!(series.range().end, at(60));
        series
            .set_items(vec![Item::new(at(300), 1.0)], "replace")
            .unwrap();
        assert_eq!(series.range(), DateRange::instant(at(300)));
    }

    #[test]
    fn test_order_by_date_is_stable() {
        let mut series = series_with(&[(60, 1.0), (0, 2.0), (60, 3.0)]);
        assert!(!series.is_sorted());
        series.order_by_date();
        let values: Vec<_> = series.items().iter().map(|i| i.value.unwrap()).collect();
        assert_eq!(values, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_extract_sub_series_inclusive() {
        let series = series_with(&[(0, 1.0), (60, 2.0), (120, 3.0), (180, 4.0)]);
        let sub = series.extract_sub_series(at(60), at(120));
        assert_eq!(sub.len(), 2);
        assert_eq!(sub[0].date, at(60));
        assert_eq!(sub[1].date, at(120));
    }

    #[test]
    fn test_set_items_then_undo_redo() {
        let mut series = series_with(&[(0, 1.0)]);
        series
            .set_items(vec![Item::new(at(0), 5.0)], "edit")
            .unwrap();
        assert_eq!(series.undo_name(), Some("edit"));

        assert!(series.undo());
        assert_eq!(series.items()[0].value, Some(1.0));
        assert_eq!(series.redo_name(), Some("edit"));

        assert!(series.redo());
        assert_eq!(series.items()[0].value, Some(5.0));
        assert!(!series.redo());
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut series = series_with(&[(0, 1.0)]);
        assert!(!series.undo());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_set_items_validates_before_recording() {
        let mut series = series_with(&[(0, 1.0)]);
        let result = series.set_items(vec![Item::min_max(at(0), 0.0, 1.0)], "bad");
        assert!(result.is_err());
        assert!(!series.can_undo());
        assert_eq!(series.items()[0].value, Some(1.0));
    }

    #[test]
    fn test_listeners_receive_reasons() {
        let mut series = series_with(&[(0, 1.0)]);
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn SeriesListener> = recorder.clone();
        series.add_listener(&listener);

        series.set_show(false);
        series.set_type(PRESSURE.clone());
        series
            .set_items(vec![Item::new(at(0) + Duration::minutes(1), 2.0)], "edit")
            .unwrap();

        assert_eq!(
            *recorder.reasons.lock(),
            vec![ChangeReason::Shown, ChangeReason::Type, ChangeReason::Content]
        );

        series.remove_listener(&listener);
        series.set_show(true);
        assert_eq!(recorder.reasons.lock().len(), 3);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut series = series_with(&[(0, 1.0)]);
        {
            let listener: Arc<dyn SeriesListener> = Arc::new(Recorder::default());
            series.add_listener(&listener);
            assert_eq!(series.listener_count(), 1);
        }
        assert_eq!(series.listener_count(), 0);
    }
}
