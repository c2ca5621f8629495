//! # In-Memory Event Bus
//!
//! Backed by `tokio::sync::broadcast`: every subscriber sees every event and
//! filters on receive. A subscriber that falls more than
//! [`DEFAULT_CHANNEL_CAPACITY`] events behind loses the oldest ones;
//! publishing never waits.

use crate::events::{CardEmulationEvent, EventFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use tokio::sync::broadcast;
use tracing::debug;

/// Diagnostics bus shared by the runtime's adapters and log sink.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<CardEmulationEvent>,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Receive every later event matching `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "New subscription created");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Hand `event` to the current subscribers. Returns how many got it.
    pub fn publish(&self, event: CardEmulationEvent) -> usize {
        let topic = event.topic();
        let source = event.source_component();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(?topic, source, receivers, "Event published");
                receivers
            }
            Err(_) => {
                debug!(?topic, source, "Event dropped (no receivers)");
                0
            }
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}
