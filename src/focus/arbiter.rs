//! Focus arbiter: grants at most one global foreground holder across all
//! channels and notifies holders of derived state changes.
//!
//! Acquire and release are processed atomically with respect to the derived
//! focus computation; notification delivery runs on a dedicated thread and
//! must not be assumed complete when the acquiring call returns.

use crate::config::ChannelEntry;
use crate::focus::channel::{Channel, ChannelHolder, FocusObserver, FocusState};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

struct Notification {
    observer: Arc<dyn FocusObserver>,
    state: FocusState,
}

/// Priority-ordered channel arbiter. Shared by the capture state machine and
/// any other channel participant; construct one and inject it everywhere.
pub struct FocusArbiter {
    channels: Mutex<Vec<Channel>>,
    notify_tx: crossbeam_channel::Sender<Notification>,
}

impl FocusArbiter {
    /// Creates an arbiter with a fixed channel table. Channel priorities are
    /// a total order for the process lifetime; the numerically highest held
    /// priority is foreground.
    pub fn new(entries: &[ChannelEntry]) -> Arc<Self> {
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded::<Notification>();

        // Delivery thread: drains until the arbiter (the only sender) drops.
        thread::spawn(move || {
            while let Ok(notification) = notify_rx.recv() {
                notification.observer.on_focus_changed(notification.state);
            }
        });

        let mut channels: Vec<Channel> = entries.iter().map(Channel::new).collect();
        // Highest priority first; derivation walks the list in order.
        channels.sort_by(|a, b| b.priority.cmp(&a.priority));

        Arc::new(Self {
            channels: Mutex::new(channels),
            notify_tx,
        })
    }

    /// Acquires `channel_name` for `activity_id`, displacing any current
    /// holder. Returns false only if the channel name is unknown.
    ///
    /// The displaced holder (if its activity id differs) is asynchronously
    /// notified `None`; every holder whose derived state changed is notified
    /// exactly once.
    pub fn acquire_channel(
        &self,
        channel_name: &str,
        observer: Arc<dyn FocusObserver>,
        activity_id: &str,
    ) -> bool {
        let mut channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(index) = channels.iter().position(|c| c.name == channel_name) else {
            warn!(channel = channel_name, "acquire failed: unknown channel");
            return false;
        };

        // Displace the current holder, if any. A re-acquire by the same
        // activity keeps its notification history so it is not re-notified
        // a state it already observed.
        let mut last_observed = FocusState::None;
        if let Some(old) = channels[index].holder.take() {
            if old.activity_id != activity_id {
                debug!(
                    channel = channel_name,
                    displaced = %old.activity_id,
                    "holder displaced"
                );
                self.queue(old.observer, FocusState::None);
            } else {
                last_observed = old.last_observed;
            }
        }

        channels[index].holder = Some(ChannelHolder {
            activity_id: activity_id.to_string(),
            observer,
            last_observed,
        });

        debug!(channel = channel_name, activity = activity_id, "channel acquired");
        self.recompute(&mut channels);
        true
    }

    /// Releases `channel_name` if `activity_id` is its current holder;
    /// otherwise a no-op. The released holder is notified `None`.
    pub fn release_channel(&self, channel_name: &str, activity_id: &str) {
        let mut channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(index) = channels.iter().position(|c| c.name == channel_name) else {
            warn!(channel = channel_name, "release failed: unknown channel");
            return;
        };

        let holds = channels[index]
            .holder
            .as_ref()
            .is_some_and(|h| h.activity_id == activity_id);
        if !holds {
            return;
        }

        if let Some(old) = channels[index].holder.take() {
            if old.last_observed != FocusState::None {
                self.queue(old.observer, FocusState::None);
            }
        }

        debug!(channel = channel_name, activity = activity_id, "channel released");
        self.recompute(&mut channels);
    }

    /// Name of the channel currently holding foreground focus, if any.
    pub fn foreground_channel(&self) -> Option<String> {
        let channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .iter()
            .find(|c| c.holder.is_some())
            .map(|c| c.name.clone())
    }

    /// Recomputes the derived global focus and queues a notification for
    /// every holder whose state differs from what it last observed.
    fn recompute(&self, channels: &mut [Channel]) {
        // Channels are sorted by priority descending: the first held one is
        // foreground, all other held ones are background.
        let mut foreground_seen = false;
        for channel in channels.iter_mut() {
            let Some(holder) = channel.holder.as_mut() else {
                continue;
            };

            let derived = if foreground_seen {
                FocusState::Background
            } else {
                foreground_seen = true;
                FocusState::Foreground
            };

            if holder.last_observed != derived {
                holder.last_observed = derived;
                self.queue(holder.observer.clone(), derived);
            }
        }
    }

    fn queue(&self, observer: Arc<dyn FocusObserver>, state: FocusState) {
        // The delivery thread lives as long as the arbiter; a send can only
        // fail during teardown, where dropping the notification is fine.
        let _ = self.notify_tx.send(Notification { observer, state });
    }
}
