//! Broadcast channel for backup events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every progress
//! report and terminal outcome is published through the bus, and each
//! WebSocket connection subscribes to receive its owner's events.

use tokio::sync::broadcast;

use super::BackupEvent;

/// Broadcast bus for [`BackupEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers. Progress is advisory, so losing events never affects the
/// outcome of a run.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BackupEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event. With no
    /// active receivers the event is silently dropped.
    pub fn publish(&self, event: BackupEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver for all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{BackupId, Operation, OwnerId};

    fn make_event(owner: &str) -> BackupEvent {
        let Some(owner) = OwnerId::parse(owner) else {
            panic!("valid owner");
        };
        BackupEvent::outcome(owner, Operation::Backup, Some(&BackupId::generate()), None)
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(make_event("U1")), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(make_event("U1"));

        let Ok(event) = rx.recv().await else {
            panic!("expected to receive event");
        };
        assert_eq!(event.owner_id().as_str(), "U1");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(make_event("U2")), 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1.owner_id(), e2.owner_id());
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
