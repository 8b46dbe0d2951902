//! Focus channel bookkeeping: states, configuration, and holders.

use crate::config::ChannelEntry;
use std::fmt;
use std::sync::Arc;

/// Focus state observed by a channel holder.
///
/// Exactly one held channel is `Foreground` at any instant: the one with the
/// numerically highest priority. Every other held channel is `Background`.
/// A former holder of a now-empty or displaced channel observes `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Foreground,
    Background,
    None,
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FocusState::Foreground => "FOREGROUND",
            FocusState::Background => "BACKGROUND",
            FocusState::None => "NONE",
        };
        write!(f, "{}", name)
    }
}

/// Observer notified of focus state changes for a channel it holds.
///
/// Notifications are delivered asynchronously, at most once per actual state
/// change, from the arbiter's delivery thread. Implementations must not block.
pub trait FocusObserver: Send + Sync {
    fn on_focus_changed(&self, state: FocusState);
}

/// One logical consumer currently holding a channel.
pub(crate) struct ChannelHolder {
    pub activity_id: String,
    pub observer: Arc<dyn FocusObserver>,
    /// Last state delivered (or queued for delivery) to this holder.
    /// Used to suppress duplicate consecutive notifications.
    pub last_observed: FocusState,
}

/// A named, priority-ranked contention point for audio focus.
pub(crate) struct Channel {
    pub name: String,
    pub priority: u32,
    pub holder: Option<ChannelHolder>,
}

impl Channel {
    pub fn new(entry: &ChannelEntry) -> Self {
        Self {
            name: entry.name.clone(),
            priority: entry.priority,
            holder: None,
        }
    }
}
