//! # Subscriptions
//!
//! A [`Subscription`] is one broadcast receiver plus the filter it applies
//! on receive. Events that do not match are consumed and skipped.

use crate::events::{CardEmulationEvent, EventFilter};
use thiserror::Error;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was dropped.
    #[error("Event bus closed")]
    Closed,
}

/// Receiving end of the diagnostics bus.
pub struct Subscription {
    receiver: broadcast::Receiver<CardEmulationEvent>,
    filter: EventFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<CardEmulationEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Wait for the next matching event.
    ///
    /// Returns `None` once the bus is gone. Events lost to lag are skipped.
    pub async fn recv(&mut self) -> Option<CardEmulationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<CardEmulationEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DeactivationOutcome, EventTopic};
    use crate::publisher::InMemoryEventBus;
    use shared_types::Category;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn overflow() -> CardEmulationEvent {
        CardEmulationEvent::RoutingOverflow {
            required_bytes: 512,
            capacity_bytes: 0,
        }
    }

    fn deactivated() -> CardEmulationEvent {
        CardEmulationEvent::SessionDeactivated {
            cycle_id: Uuid::new_v4(),
            outcome: DeactivationOutcome::Succeeded,
            category: Category::Payment,
        }
    }

    #[tokio::test]
    async fn test_recv_skips_other_topics() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Session]));

        bus.publish(overflow());
        bus.publish(deactivated());

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert!(matches!(received, CardEmulationEvent::SessionDeactivated { .. }));
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);

        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_try_recv() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Routing]));
        assert!(matches!(sub.try_recv(), Ok(None)));

        bus.publish(deactivated());
        assert!(matches!(sub.try_recv(), Ok(None)));

        bus.publish(overflow());
        assert!(matches!(
            sub.try_recv(),
            Ok(Some(CardEmulationEvent::RoutingOverflow { .. }))
        ));

        drop(bus);
        assert!(matches!(sub.try_recv(), Err(SubscriptionError::Closed)));
    }
}
