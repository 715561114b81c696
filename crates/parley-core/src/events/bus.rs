//! Event bus using tokio broadcast channel
//!
//! Provides non-blocking event emission with multiple subscribers.
//! Slow subscribers will miss events rather than blocking senders.

use crate::events::EngagementEvent;
use tokio::sync::broadcast;

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for engagement events
///
/// Events are fire-and-forget; if no subscribers are listening, they are
/// simply dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngagementEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Emit an event to all subscribers. Never blocks, never fails.
    pub fn emit(&self, event: EngagementEvent) {
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber to event bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EngagementEvent>,
}

impl EventSubscriber {
    /// Receive the next event
    ///
    /// Returns None if the bus was dropped. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<EngagementEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event subscriber lagged by {} events", n);
                    continue;
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<EngagementEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain every event currently buffered.
    pub fn drain(&mut self) -> Vec<EngagementEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::types::TopicId;

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.emit(EngagementEvent::new(
            "g1",
            EventKind::TopicOpened { topic_id: TopicId(1) },
        ));

        let received = sub.recv().await.unwrap();
        assert_eq!(received.conversation_id, "g1");
    }

    #[tokio::test]
    async fn test_no_subscribers_no_panic() {
        let bus = EventBus::new();
        bus.emit(EngagementEvent::new(
            "g1",
            EventKind::ProactiveSent { messages: 2 },
        ));
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
