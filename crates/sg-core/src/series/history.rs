//! Undo/redo log of item snapshots

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Items, SeriesId};

/// Default number of modifications kept per series
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Orders modifications across every series of the process
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Snapshot of a series' items taken right before an operation changed them
#[derive(Debug, Clone)]
pub struct Modification {
    name: String,
    timestamp: DateTime<Utc>,
    items: Items,
    applies_to_all: bool,
    series: SeriesId,
    group: Uuid,
    sequence: u64,
}

impl Modification {
    pub fn new(
        series: SeriesId,
        name: impl Into<String>,
        items: Items,
        applies_to_all: bool,
        group: Uuid,
    ) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            items,
            applies_to_all,
            series,
            group,
            sequence: next_sequence(),
        }
    }

    /// Same operation, holding another snapshot. Used to build the inverse
    /// entry when a modification moves between the undo and redo stacks.
    fn inverse(&self, items: Items) -> Self {
        Self {
            name: self.name.clone(),
            timestamp: Utc::now(),
            items,
            applies_to_all: self.applies_to_all,
            series: self.series,
            group: self.group,
            sequence: next_sequence(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    pub fn applies_to_all(&self) -> bool {
        self.applies_to_all
    }

    pub fn series(&self) -> SeriesId {
        self.series
    }

    /// Shared by the modifications recorded together on sibling series
    pub fn group(&self) -> Uuid {
        self.group
    }

    /// Process-wide creation order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Linear undo/redo stacks for one series
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Modification>,
    redo: Vec<Modification>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a new modification; drops the redo stack and the oldest entry
    /// once the capacity is exceeded
    pub fn push(&mut self, modification: Modification) {
        self.redo.clear();
        self.undo.push_back(modification);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    /// Pop the latest modification, recording `current` as its redo snapshot.
    /// Returns the items to restore.
    pub fn undo(&mut self, current: Items) -> Option<Items> {
        let modification = self.undo.pop_back()?;
        self.redo.push(modification.inverse(current));
        Some(modification.items)
    }

    /// Pop the latest undone modification, recording `current` as its undo
    /// snapshot. Returns the items to restore.
    pub fn redo(&mut self, current: Items) -> Option<Items> {
        let modification = self.redo.pop()?;
        self.undo.push_back(modification.inverse(current));
        Some(modification.items)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn last_undo(&self) -> Option<&Modification> {
        self.undo.back()
    }

    pub fn last_redo(&self) -> Option<&Modification> {
        self.redo.last()
    }

    /// Undo entries, oldest first
    pub fn undo_entries(&self) -> impl Iterator<Item = &Modification> {
        self.undo.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
