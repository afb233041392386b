//! Series change listener trait

use super::Series;

/// Why a series notified its listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// Visibility toggled
    Shown,
    /// Series type replaced
    Type,
    /// Items changed (set, undo, redo, sort, append)
    Content,
    /// Name, color or draw style changed
    Style,
}

/// Trait for components that need to respond to series changes.
///
/// Listeners are called synchronously while the series is borrowed and must
/// not lock the repository entry of the series they are notified about.
pub trait SeriesListener: Send + Sync {
    fn on_series_change(&self, series: &Series, reason: ChangeReason);
}
