//! Store event fan-out.
//!
//! Each [`GroupStore`](crate::GroupStore) owns one bus. Subscribers see
//! events published after they subscribed; a subscriber that falls more than
//! the bus capacity behind loses the oldest events and keeps going.

use crate::models::StoreEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Events buffered per subscriber.
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

/// Broadcast channel for [`StoreEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Nobody listening is fine.
    pub fn publish(&self, event: StoreEvent) {
        metrics::counter!("event_bus_publish_total", "event" => event.event_type()).increment(1);
        if self.sender.send(event).is_err() {
            metrics::counter!("event_bus_unobserved_total").increment(1);
        }
    }

    /// Subscribes to every event.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            kind: None,
        }
    }

    /// Subscribes to one event kind, as named by [`StoreEvent::event_type`].
    #[must_use]
    pub fn subscribe_event_type(&self, kind: &'static str) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            kind: Some(kind),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUS_CAPACITY)
    }
}

/// A subscriber's view of the bus, optionally limited to one event kind.
pub struct EventSubscription {
    receiver: broadcast::Receiver<StoreEvent>,
    kind: Option<&'static str>,
}

impl EventSubscription {
    /// Waits for the next matching event.
    ///
    /// Returns `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {},
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Takes every matching event already buffered, without waiting.
    pub fn drain(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => events.push(event),
                Ok(_) => {},
                Err(TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
            }
        }
    }

    fn matches(&self, event: &StoreEvent) -> bool {
        self.kind.is_none_or(|kind| event.event_type() == kind)
    }

    fn lagged(&self, skipped: u64) {
        metrics::counter!("event_bus_lagged_total").increment(skipped);
        tracing::warn!(skipped, kind = self.kind.unwrap_or("all"), "Event subscriber lagged");
    }
}
