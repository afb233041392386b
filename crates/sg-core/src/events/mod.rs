//! Application-wide event bus
//!
//! Per-series content changes go through [`crate::series::SeriesListener`];
//! this bus carries the coarser repository and file events consumed by menus
//! and status bars.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Token returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Common system events
pub mod events {
    use std::path::PathBuf;

    use super::Event;
    use crate::series::SeriesId;

    /// A series entered the repository
    #[derive(Debug, Clone)]
    pub struct SeriesAdded {
        pub id: SeriesId,
        pub name: String,
    }

    /// A series left the repository
    #[derive(Debug, Clone)]
    pub struct SeriesDeleted {
        pub id: SeriesId,
        pub name: String,
    }

    /// A modification was undone or redone
    #[derive(Debug, Clone)]
    pub struct HistoryChanged {
        pub series: Vec<SeriesId>,
        pub label: String,
        pub undone: bool,
    }

    /// A file was read into the repository
    #[derive(Debug, Clone)]
    pub struct FileLoaded {
        pub path: PathBuf,
        pub reader: String,
        pub series_count: usize,
    }

    /// A file could not be read
    #[derive(Debug, Clone)]
    pub struct FileReadFailed {
        pub path: PathBuf,
        pub error: String,
    }

    /// Series were written to disk
    #[derive(Debug, Clone)]
    pub struct FileSaved {
        pub path: PathBuf,
        pub series_count: usize,
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        SeriesAdded,
        SeriesDeleted,
        HistoryChanged,
        FileLoaded,
        FileReadFailed,
        FileSaved
    );
}

type HandlerList = Vec<(SubscriptionId, Box<dyn EventHandler>)>;

/// System-wide event bus
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<TypeId, HandlerList>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, handler));
        id
    }

    /// Subscribe a typed closure
    pub fn on<E, F>(&self, mut f: F) -> SubscriptionId
    where
        E: Event,
        F: FnMut(&E) + Send + Sync + 'static,
    {
        self.subscribe::<E>(handler_from_fn(move |event| {
            if let Some(event) = event.as_any().downcast_ref::<E>() {
                f(event);
            }
        }))
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(handler_id, _)| *handler_id != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Publish an event
    pub fn publish<E: Event>(&self, event: E) {
        let mut handlers = self.handlers.lock();
        if let Some(event_handlers) = handlers.get_mut(&TypeId::of::<E>()) {
            for (_, handler) in event_handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}
