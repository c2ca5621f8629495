//! # Bus Diagnostics
//!
//! Publishes component diagnostics on the shared event bus. One adapter
//! serves both the routing and the session diagnostics ports.

use nfc_telemetry::DIAGNOSTIC_EVENTS;
use shared_bus::{CardEmulationEvent, EventTopic, InMemoryEventBus};
use std::sync::Arc;
use tracing::trace;

pub struct BusDiagnostics {
    bus: Arc<InMemoryEventBus>,
}

impl BusDiagnostics {
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }

    /// Count and publish one event.
    pub fn publish(&self, event: CardEmulationEvent) {
        DIAGNOSTIC_EVENTS
            .with_label_values(&[topic_label(event.topic())])
            .inc();
        let receivers = self.bus.publish(event);
        trace!(receivers, "Diagnostic published");
    }
}

/// Metric label for a bus topic.
pub fn topic_label(topic: EventTopic) -> &'static str {
    match topic {
        EventTopic::Resolution => "resolution",
        EventTopic::Routing => "routing",
        EventTopic::Dispatch => "dispatch",
        EventTopic::Session => "session",
        EventTopic::All => "all",
    }
}

impl ce_02_aid_routing::DiagnosticsSink for BusDiagnostics {
    fn emit(&self, event: CardEmulationEvent) {
        self.publish(event);
    }
}

impl ce_03_host_emulation::DiagnosticsSink for BusDiagnostics {
    fn emit(&self, event: CardEmulationEvent) {
        self.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::EventFilter;

    #[tokio::test]
    async fn test_both_ports_publish() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let diagnostics = BusDiagnostics::new(bus.clone());

        ce_02_aid_routing::DiagnosticsSink::emit(
            &diagnostics,
            CardEmulationEvent::RoutingCommitFailed {
                reason: "busy".into(),
            },
        );
        ce_03_host_emulation::DiagnosticsSink::emit(
            &diagnostics,
            CardEmulationEvent::ObserveModeChanged { enabled: false },
        );

        assert!(matches!(
            sub.recv().await,
            Some(CardEmulationEvent::RoutingCommitFailed { .. })
        ));
        assert!(matches!(
            sub.recv().await,
            Some(CardEmulationEvent::ObserveModeChanged { enabled: false })
        ));
    }

    #[test]
    fn test_topic_labels() {
        assert_eq!(topic_label(EventTopic::Dispatch), "dispatch");
        assert_eq!(topic_label(EventTopic::Routing), "routing");
    }
}
