//! Lifecycle notifications and the publish/subscribe bus that carries them.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Notifications published by the recorder and the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroEvent {
    RecordingStarted,
    RecordingStopped,
    /// The repository content changed (append, clear, load).
    ActionsChanged { count: usize },
    PlaybackStarted,
    PlaybackStopped { executed: u64 },
    /// Progress: total actions executed so far in the current run.
    ActionExecuted { executed: u64 },
}

impl MacroEvent {
    /// Mode transitions, as opposed to progress and content notifications.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            MacroEvent::RecordingStarted
                | MacroEvent::RecordingStopped
                | MacroEvent::PlaybackStarted
                | MacroEvent::PlaybackStopped { .. }
        )
    }
}

struct Subscriber {
    tx: Sender<MacroEvent>,
    filter: Option<fn(&MacroEvent) -> bool>,
}

/// Event bus for publishing and subscribing to macro events.
///
/// Every subscriber gets its own channel, so the playback thread never calls
/// back into the control context; it only enqueues.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

pub type SharedEventBus = Arc<EventBus>;

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to all live subscribers. Dropped receivers are pruned.
    pub fn publish(&self, event: MacroEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|sub| match sub.filter {
            Some(wanted) if !wanted(&event) => true,
            _ => sub.tx.send(event.clone()).is_ok(),
        });
        if subscribers.is_empty() {
            trace!(?event, "No subscribers for event");
        }
    }

    pub fn subscribe(&self) -> Receiver<MacroEvent> {
        self.add_subscriber(None)
    }

    /// Subscribe to the events accepted by `filter` only.
    pub fn subscribe_filtered(&self, filter: fn(&MacroEvent) -> bool) -> Receiver<MacroEvent> {
        self.add_subscriber(Some(filter))
    }

    fn add_subscriber(&self, filter: Option<fn(&MacroEvent) -> bool>) -> Receiver<MacroEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber { tx, filter });
        rx
    }
}

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(MacroEvent::PlaybackStarted);
        bus.publish(MacroEvent::PlaybackStopped { executed: 3 });

        for rx in [a, b] {
            let got: Vec<_> = rx.try_iter().collect();
            assert_eq!(
                got,
                vec![
                    MacroEvent::PlaybackStarted,
                    MacroEvent::PlaybackStopped { executed: 3 }
                ]
            );
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(MacroEvent::RecordingStarted);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
        assert_eq!(kept.try_recv().unwrap(), MacroEvent::RecordingStarted);
    }

    #[test]
    fn test_filtered_subscriber_skips_progress() {
        let bus = EventBus::new();
        let lifecycle = bus.subscribe_filtered(MacroEvent::is_lifecycle);

        bus.publish(MacroEvent::PlaybackStarted);
        for executed in 1..=100 {
            bus.publish(MacroEvent::ActionExecuted { executed });
        }
        bus.publish(MacroEvent::ActionsChanged { count: 2 });
        bus.publish(MacroEvent::PlaybackStopped { executed: 100 });

        let got: Vec<_> = lifecycle.try_iter().collect();
        assert_eq!(
            got,
            vec![
                MacroEvent::PlaybackStarted,
                MacroEvent::PlaybackStopped { executed: 100 }
            ]
        );
    }
}
