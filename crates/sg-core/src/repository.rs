//! Registry of every live series
//!
//! Replaces a process-wide static list: the repository is owned by the
//! application state and handed to whoever needs to enumerate or mutate series.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{SeriesError, TransformError};
use crate::events::{events, EventBus};
use crate::series::{DateRange, Item, Origin, Series, SeriesId, DEFAULT_HISTORY_CAPACITY};
use crate::transform::offset::{offset_label, shifted_items, OffsetUnit};

/// Shared handle on a registered series
pub type SeriesHandle = Arc<RwLock<Series>>;

/// Ordered collection of series, in insertion order
pub struct SeriesRepository {
    entries: RwLock<IndexMap<SeriesId, SeriesHandle>>,
    event_bus: Arc<EventBus>,
    history_capacity: usize,
}

impl SeriesRepository {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            event_bus,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// History bound applied to every series added from now on
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Register a series
    pub fn add(&self, series: Series) -> SeriesHandle {
        let series = series.with_history_capacity(self.history_capacity);
        let id = series.id();
        let name = series.name().to_string();
        let handle = Arc::new(RwLock::new(series));
        self.entries.write().insert(id, handle.clone());
        debug!("Registered series '{}' ({})", name, id);
        self.event_bus.publish(events::SeriesAdded { id, name });
        handle
    }

    pub fn add_all(&self, series: impl IntoIterator<Item = Series>) -> Vec<SeriesHandle> {
        series.into_iter().map(|s| self.add(s)).collect()
    }

    pub fn get(&self, id: SeriesId) -> Option<SeriesHandle> {
        self.entries.read().get(&id).cloned()
    }

    /// Like [`SeriesRepository::get`], failing with `UnknownSeries`
    pub fn require(&self, id: SeriesId) -> Result<SeriesHandle, SeriesError> {
        self.get(id).ok_or(SeriesError::UnknownSeries(id))
    }

    /// All series in insertion order
    pub fn instances(&self) -> Vec<SeriesHandle> {
        self.entries.read().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<SeriesId> {
        self.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// First series with the given name
    pub fn find_by_name(&self, name: &str) -> Option<SeriesHandle> {
        self.instances().into_iter().find(|h| h.read().name() == name)
    }

    /// Series read from `origin`
    pub fn with_origin(&self, origin: &Origin) -> Vec<SeriesHandle> {
        self.instances()
            .into_iter()
            .filter(|h| h.read().origin() == Some(origin))
            .collect()
    }

    /// The series itself followed by every other series from the same file.
    /// A series without origin only has itself.
    pub fn same_origin(&self, id: SeriesId) -> Result<Vec<SeriesHandle>, SeriesError> {
        let handle = self.require(id)?;
        let origin = handle.read().origin().cloned();
        let mut siblings = vec![handle];
        if let Some(origin) = origin {
            siblings.extend(
                self.with_origin(&origin)
                    .into_iter()
                    .filter(|h| h.read().id() != id),
            );
        }
        Ok(siblings)
    }

    /// Remove a series and detach its listeners. Siblings are unaffected.
    pub fn delete(&self, id: SeriesId) -> Result<(), SeriesError> {
        let handle = self
            .entries
            .write()
            .shift_remove(&id)
            .ok_or(SeriesError::UnknownSeries(id))?;
        let name = {
            let mut series = handle.write();
            series.clear_listeners();
            series.name().to_string()
        };
        info!("Deleted series '{}'", name);
        self.event_bus.publish(events::SeriesDeleted { id, name });
        Ok(())
    }

    /// Remove every series
    pub fn clear(&self) {
        for id in self.ids() {
            // Ids come from the map itself
            let _ = self.delete(id);
        }
    }

    /// Replace the items of every series sharing `id`'s origin.
    ///
    /// New item lists are all computed and validated before any series is
    /// touched, so a failure leaves the whole group unchanged. The recorded
    /// modifications share one group and are flagged `applies_to_all`.
    pub fn modify_origin<F>(&self, id: SeriesId, label: &str, mut f: F) -> Result<usize, TransformError>
    where
        F: FnMut(&Series) -> Result<Vec<Item>, TransformError>,
    {
        let siblings = self.same_origin(id)?;
        let mut updates = Vec::with_capacity(siblings.len());
        for handle in &siblings {
            let series = handle.read();
            let items = f(&series)?;
            for item in &items {
                series.validate(item)?;
            }
            updates.push(items);
        }

        let group = Uuid::new_v4();
        for (handle, items) in siblings.iter().zip(updates) {
            handle.write().set_items_with(items, label, true, group)?;
        }
        info!("Applied '{}' to {} series", label, siblings.len());
        Ok(siblings.len())
    }

    /// Shift every series of `id`'s file by `amount` of `unit`
    pub fn apply_offset_to_origin(&self, id: SeriesId, amount: i64, unit: OffsetUnit) -> Result<usize, TransformError> {
        let label = offset_label(amount, unit);
        self.modify_origin(id, &label, |series| shifted_items(series, amount, unit))
    }

    /// Keep only the items within `window` on every series of `id`'s file
    pub fn limit_origin(&self, id: SeriesId, window: DateRange) -> Result<usize, TransformError> {
        self.modify_origin(id, "limit", |series| {
            Ok(series.extract_sub_series(window.start, window.end))
        })
    }

    /// Undo the last modification of a series.
    ///
    /// When that modification was applied to all series of the file, the
    /// matching modification of each sibling is undone too. Returns `false`
    /// when there was nothing to undo.
    pub fn undo(&self, id: SeriesId) -> Result<bool, SeriesError> {
        self.step_history(id, true)
    }

    /// Redo counterpart of [`SeriesRepository::undo`]
    pub fn redo(&self, id: SeriesId) -> Result<bool, SeriesError> {
        self.step_history(id, false)
    }

    /// Undo the most recent modification across all series
    pub fn undo_last(&self) -> Result<bool, SeriesError> {
        match self.latest(true) {
            Some(id) => self.undo(id),
            None => Ok(false),
        }
    }

    /// Redo the most recently undone modification across all series
    pub fn redo_last(&self) -> Result<bool, SeriesError> {
        match self.latest(false) {
            Some(id) => self.redo(id),
            None => Ok(false),
        }
    }

    fn latest(&self, undo: bool) -> Option<SeriesId> {
        self.instances()
            .iter()
            .filter_map(|handle| {
                let series = handle.read();
                let history = series.history();
                let entry = if undo {
                    history.last_undo()
                } else {
                    history.last_redo()
                };
                entry.map(|m| (m.sequence(), series.id()))
            })
            .max_by_key(|(sequence, _)| *sequence)
            .map(|(_, id)| id)
    }

    fn step_history(&self, id: SeriesId, undo: bool) -> Result<bool, SeriesError> {
        let handle = self.require(id)?;
        let top = {
            let series = handle.read();
            let history = series.history();
            let entry = if undo {
                history.last_undo()
            } else {
                history.last_redo()
            };
            entry.map(|m| (m.name().to_string(), m.applies_to_all(), m.group()))
        };
        let Some((label, applies_to_all, group)) = top else {
            return Ok(false);
        };

        let targets = if applies_to_all {
            self.same_origin(id)?
                .into_iter()
                .filter(|h| {
                    let series = h.read();
                    let entry = if undo {
                        series.history().last_undo()
                    } else {
                        series.history().last_redo()
                    };
                    entry.map(|m| m.group() == group).unwrap_or(false)
                })
                .collect()
        } else {
            vec![handle]
        };

        let mut changed = Vec::with_capacity(targets.len());
        for target in &targets {
            let mut series = target.write();
            let stepped = if undo { series.undo() } else { series.redo() };
            if stepped {
                changed.push(series.id());
            }
        }

        info!(
            "{} '{}' on {} series",
            if undo { "Undid" } else { "Redid" },
            label,
            changed.len()
        );
        self.event_bus.publish(events::HistoryChanged {
            series: changed,
            label,
            undone: undo,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{ChangeReason, SeriesListener};
    use crate::types::{PRESSURE, TEMPERATURE};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn repository() -> SeriesRepository {
        SeriesRepository::new(Arc::new(EventBus::new()))
    }

    fn series(name: &str, origin: &str, values: &[f64]) -> Series {
        let mut series = Series::new(name, PRESSURE.clone()).with_origin(Origin::new(origin));
        for (i, v) in values.iter().enumerate() {
            series.add_item(Item::new(at(i as i64 * 60), *v)).unwrap();
        }
        series
    }

    fn values(handle: &SeriesHandle) -> Vec<f64> {
        handle.read().items().iter().filter_map(|i| i.value).collect()
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl SeriesListener for Counter {
        fn on_series_change(&self, _series: &Series, _reason: ChangeReason) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_instances_keep_insertion_order() {
        let repo = repository();
        repo.add(series("b", "f.csv", &[1.0]));
        repo.add(series("a", "f.csv", &[1.0]));
        repo.add(series("c", "g.csv", &[1.0]));
        let names: Vec<_> = repo
            .instances()
            .iter()
            .map(|h| h.read().name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_delete_detaches_listeners() {
        let repo = repository();
        let handle = repo.add(series("p", "f.csv", &[1.0]));
        let other = repo.add(series("q", "f.csv", &[1.0]));
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn SeriesListener> = counter.clone();
        handle.write().add_listener(&listener);

        let id = handle.read().id();
        repo.delete(id).unwrap();

        assert_eq!(repo.len(), 1);
        assert!(repo.get(id).is_none());
        assert!(repo.get(other.read().id()).is_some());

        handle.write().set_show(false);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert!(matches!(repo.delete(id), Err(SeriesError::UnknownSeries(_))));
    }

    #[test]
    fn test_same_origin_starts_with_series() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0]));
        let b = repo.add(series("b", "f.csv", &[1.0]));
        repo.add(series("c", "g.csv", &[1.0]));
        let b_id = b.read().id();

        let siblings = repo.same_origin(b_id).unwrap();
        assert_eq!(siblings.len(), 2);
        assert_eq!(siblings[0].read().id(), b_id);
        assert_eq!(siblings[1].read().id(), a.read().id());
    }

    #[test]
    fn test_modify_origin_then_undo_all() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0, 2.0]));
        let b = repo.add(series("b", "f.csv", &[3.0]));
        let c = repo.add(series("c", "g.csv", &[5.0]));
        let a_id = a.read().id();

        let count = repo
            .modify_origin(a_id, "double", |s| {
                Ok(s.items().iter().map(|i| i.with_value_delta(i.value.unwrap())).collect())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(values(&a), vec![2.0, 4.0]);
        assert_eq!(values(&b), vec![6.0]);
        assert_eq!(values(&c), vec![5.0]);

        let b_id = b.read().id();
        assert!(repo.undo(b_id).unwrap());
        assert_eq!(values(&a), vec![1.0, 2.0]);
        assert_eq!(values(&b), vec![3.0]);

        assert!(repo.redo(a_id).unwrap());
        assert_eq!(values(&a), vec![2.0, 4.0]);
        assert_eq!(values(&b), vec![6.0]);
    }

    #[test]
    fn test_modify_origin_failure_changes_nothing() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0]));
        let b = repo.add(series("b", "f.csv", &[2.0]));
        let b_id = b.read().id();

        let a_id = a.read().id();
        let result = repo.modify_origin(a_id, "fail", |s| {
            if s.id() == b_id {
                Err(TransformError::InvalidBucket)
            } else {
                Ok(Vec::new())
            }
        });
        assert!(result.is_err());
        assert_eq!(values(&a), vec![1.0]);
        assert!(!a.read().can_undo());
    }

    #[test]
    fn test_modify_origin_invalid_sibling_changes_nothing() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0]));
        let b = repo.add(series("b", "f.csv", &[2.0]));
        let b_id = b.read().id();

        let a_id = a.read().id();
        let result = repo.modify_origin(a_id, "reshape", |s| {
            if s.id() == b_id {
                Ok(vec![Item::min_max(at(0), 1.0, 3.0)])
            } else {
                Ok(vec![Item::new(at(0), 5.0)])
            }
        });
        assert!(matches!(result, Err(TransformError::Series(SeriesError::InvalidItem { .. }))));
        assert_eq!(values(&a), vec![1.0]);
        assert_eq!(values(&b), vec![2.0]);
        assert!(!a.read().can_undo());
        assert!(!b.read().can_undo());
    }

    #[test]
    fn test_offset_origin_shares_one_group() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0, 2.0]));
        let b = repo.add(series("b", "f.csv", &[3.0]));
        let c = repo.add(series("c", "g.csv", &[4.0]));
        let a_id = a.read().id();

        assert_eq!(repo.apply_offset_to_origin(a_id, 1, OffsetUnit::Hour).unwrap(), 2);
        assert_eq!(a.read().items()[0].date, at(3600));
        assert_eq!(b.read().items()[0].date, at(3600));
        assert_eq!(c.read().items()[0].date, at(0));

        let group_of = |h: &SeriesHandle| h.read().history().last_undo().map(|m| m.group());
        assert!(group_of(&a).is_some());
        assert_eq!(group_of(&a), group_of(&b));
        assert_eq!(a.read().undo_name(), Some("offset +1 hour"));
    }

    #[test]
    fn test_single_undo_leaves_siblings() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0]));
        let b = repo.add(series("b", "f.csv", &[2.0]));
        a.write().set_items(vec![Item::new(at(0), 9.0)], "edit").unwrap();
        b.write().set_items(vec![Item::new(at(0), 8.0)], "edit").unwrap();

        let a_id = a.read().id();
        assert!(repo.undo(a_id).unwrap());
        assert_eq!(values(&a), vec![1.0]);
        assert_eq!(values(&b), vec![8.0]);
    }

    #[test]
    fn test_undo_last_picks_most_recent() {
        let repo = repository();
        let a = repo.add(series("a", "f.csv", &[1.0]));
        let b = repo.add(Series::new("b", TEMPERATURE.clone()));
        a.write().set_items(vec![Item::new(at(0), 9.0)], "first").unwrap();
        b.write().set_items(vec![Item::new(at(0), 7.0)], "second").unwrap();

        assert!(repo.undo_last().unwrap());
        assert!(b.read().is_empty());
        assert_eq!(values(&a), vec![9.0]);

        assert!(repo.undo_last().unwrap());
        assert_eq!(values(&a), vec![1.0]);
        assert!(!repo.undo_last().unwrap());

        assert!(repo.redo_last().unwrap());
        assert_eq!(values(&a), vec![9.0]);
    }

    #[test]
    fn test_events_published() {
        let repo = repository();
        let added = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let (a, d) = (added.clone(), deleted.clone());
        repo.event_bus().on::<events::SeriesAdded, _>(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        repo.event_bus().on::<events::SeriesDeleted, _>(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let handle = repo.add(series("a", "f.csv", &[1.0]));
        repo.add(series("b", "f.csv", &[1.0]));
        let id = handle.read().id();
        repo.delete(id).unwrap();
        repo.clear();

        assert_eq!(added.load(Ordering::SeqCst), 2);
        assert_eq!(deleted.load(Ordering::SeqCst), 2);
        assert!(repo.is_empty());
    }
}
