//! The single global subscriber slot.
//!
//! At most one push-channel connection receives relay events at a time.
//! Attaching a new subscriber replaces (and thereby ends) the previous one.
//! Events produced while the slot is empty are dropped.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::event::RelayEvent;
use crate::types::Timestamp;

use super::lock;

/// Identifies one attachment of the global subscriber.
pub type SubscriberId = uuid::Uuid;

/// Channel sender half used to push events to a connection.
pub type EventSender = mpsc::UnboundedSender<RelayEvent>;

/// Channel receiver half drained by a connection.
pub type EventReceiver = mpsc::UnboundedReceiver<RelayEvent>;

struct Subscriber {
    id: SubscriberId,
    sender: EventSender,
    attached_at: Timestamp,
}

/// Holds the currently attached subscriber, if any.
pub struct SubscriberSlot {
    current: Mutex<Option<Subscriber>>,
}

impl SubscriberSlot {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Attach a new subscriber, replacing any existing one.
    ///
    /// The replaced subscriber's sender is dropped, so its receiver yields
    /// whatever is still queued and then ends.
    pub fn attach(&self) -> (SubscriberId, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = uuid::Uuid::new_v4();
        let previous = lock(&self.current).replace(Subscriber {
            id,
            sender: tx,
            attached_at: chrono::Utc::now(),
        });

        if let Some(prev) = previous {
            tracing::info!(
                subscriber_id = %prev.id,
                replaced_by = %id,
                connected_secs = (chrono::Utc::now() - prev.attached_at).num_seconds(),
                "Subscriber replaced"
            );
        }
        (id, rx)
    }

    /// Detach the subscriber with the given id.
    ///
    /// Returns `false` when a different subscriber (or none) occupies the
    /// slot, which happens after a replacement or after the relay closed it.
    pub fn detach(&self, id: SubscriberId) -> bool {
        let mut current = lock(&self.current);
        match current.as_ref() {
            Some(sub) if sub.id == id => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// Deliver an event to the attached subscriber.
    ///
    /// Returns whether the event was handed to a live connection. A closed
    /// receiver clears the slot.
    pub fn send(&self, event: &RelayEvent) -> bool {
        let mut current = lock(&self.current);
        let Some(sub) = current.as_ref() else {
            return false;
        };
        if sub.sender.send(event.clone()).is_ok() {
            return true;
        }
        tracing::debug!(subscriber_id = %sub.id, "Subscriber channel closed, detaching");
        *current = None;
        false
    }

    /// Remove the attached subscriber, ending its stream.
    pub fn close(&self) -> Option<SubscriberId> {
        lock(&self.current).take().map(|sub| sub.id)
    }

    /// Id of the attached subscriber.
    pub fn current_id(&self) -> Option<SubscriberId> {
        lock(&self.current).as_ref().map(|sub| sub.id)
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.current).is_some()
    }
}

impl Default for SubscriberSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_empty() {
        let slot = SubscriberSlot::new();
        assert!(!slot.is_attached());
        assert_eq!(slot.current_id(), None);
    }

    #[test]
    fn send_without_subscriber_is_dropped() {
        let slot = SubscriberSlot::new();
        assert!(!slot.send(&RelayEvent::info("nobody listening")));
    }

    #[tokio::test]
    async fn attached_subscriber_receives_events() {
        let slot = SubscriberSlot::new();
        let (_id, mut rx) = slot.attach();

        assert!(slot.send(&RelayEvent::stdout("hi")));

        let event = rx.recv().await.expect("event delivered");
        assert_eq!(event, RelayEvent::stdout("hi"));
    }

    #[tokio::test]
    async fn attach_replaces_and_ends_previous_stream() {
        let slot = SubscriberSlot::new();
        let (old_id, mut old_rx) = slot.attach();
        let (new_id, mut new_rx) = slot.attach();
        assert_ne!(old_id, new_id);
        assert_eq!(slot.current_id(), Some(new_id));

        slot.send(&RelayEvent::stdout("only for new"));

        assert!(old_rx.recv().await.is_none(), "old stream should end");
        assert_eq!(new_rx.recv().await, Some(RelayEvent::stdout("only for new")));
    }

    #[test]
    fn stale_detach_does_not_remove_replacement() {
        let slot = SubscriberSlot::new();
        let (old_id, _old_rx) = slot.attach();
        let (new_id, _new_rx) = slot.attach();

        assert!(!slot.detach(old_id));
        assert_eq!(slot.current_id(), Some(new_id));

        assert!(slot.detach(new_id));
        assert!(!slot.is_attached());
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let slot = SubscriberSlot::new();
        let (id, mut rx) = slot.attach();

        slot.send(&RelayEvent::info("last"));
        assert_eq!(slot.close(), Some(id));

        assert_eq!(rx.recv().await, Some(RelayEvent::info("last")));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn send_to_dropped_receiver_clears_slot() {
        let slot = SubscriberSlot::new();
        let (_id, rx) = slot.attach();
        drop(rx);

        assert!(!slot.send(&RelayEvent::stdout("lost")));
        assert!(!slot.is_attached());
    }
}
