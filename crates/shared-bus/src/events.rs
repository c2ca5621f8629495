//! # Card Emulation Events
//!
//! Defines all event types that flow through the shared bus. Components
//! publish these as fire-and-forget diagnostics; nothing on the bus feeds
//! back into control flow.

use serde::{Deserialize, Serialize};
use shared_types::{Category, ComponentName};
use uuid::Uuid;

/// Component id of the AID Resolution Engine.
pub const COMPONENT_RESOLUTION: u8 = 1;
/// Component id of the Routing Table Synthesizer.
pub const COMPONENT_ROUTING: u8 = 2;
/// Component id of the Emulation Session State Machine.
pub const COMPONENT_SESSION: u8 = 3;
/// Component id of the runtime wiring.
pub const COMPONENT_RUNTIME: u8 = 0;

/// Policy gate that rejected an otherwise valid default service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyViolationKind {
    /// Service requires unlock (or secure NFC is on) and the keyguard is up.
    DeviceLocked,
    /// Service requires the screen on and it is off.
    ScreenOff,
    /// Service is not host resident, so the host cannot answer for it.
    NotOnHost,
}

/// How a field-activation cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeactivationOutcome {
    /// The service was bound and answered at least one command.
    Succeeded,
    /// The field dropped while the bind was still in flight.
    DisconnectedBeforeBound,
    /// The service was bound but had not answered the first command.
    DisconnectedBeforeFirstResponse,
}

impl DeactivationOutcome {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::DisconnectedBeforeBound => "disconnected_before_bound",
            Self::DisconnectedBeforeFirstResponse => "disconnected_before_first_response",
        }
    }
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CardEmulationEvent {
    // =========================================================================
    // COMPONENT 1: AID RESOLUTION
    // =========================================================================
    /// The resolution cache was dropped wholesale.
    ResolutionInvalidated {
        /// What changed (services, wallet role, foreground, nfc state, user).
        cause: String,
    },

    // =========================================================================
    // COMPONENT 2: ROUTING
    // =========================================================================
    /// A new routing table was committed to the controller.
    RoutingCommitted {
        /// Rows in the committed table.
        entries: usize,
        /// Serialized size in bytes.
        size_bytes: usize,
    },

    /// The desired table did not fit and was not committed.
    RoutingOverflow {
        /// Serialized size of the desired table.
        required_bytes: usize,
        /// Capacity reported by the controller.
        capacity_bytes: usize,
    },

    /// The controller refused a route, unroute or commit call.
    RoutingCommitFailed {
        /// Controller error text.
        reason: String,
    },

    // =========================================================================
    // COMPONENT 3: EMULATION SESSION
    // =========================================================================
    /// A SELECT resolved to several candidates with no default.
    AidConflict {
        aid: String,
        candidates: Vec<ComponentName>,
        category: Category,
    },

    /// A valid default service was rejected by a policy gate.
    PolicyViolation {
        aid: String,
        service: ComponentName,
        violation: PolicyViolationKind,
    },

    /// SELECTed AIDs that no service could answer, aggregated over a short window.
    UnroutableAids {
        aids: Vec<String>,
    },

    /// A field-activation cycle ended after a SELECT was resolved.
    SessionDeactivated {
        /// Activation cycle identifier.
        cycle_id: Uuid,
        outcome: DeactivationOutcome,
        category: Category,
    },

    /// Observe mode was switched by the session.
    ObserveModeChanged {
        enabled: bool,
    },
}

impl CardEmulationEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ResolutionInvalidated { .. } => EventTopic::Resolution,
            Self::RoutingCommitted { .. }
            | Self::RoutingOverflow { .. }
            | Self::RoutingCommitFailed { .. } => EventTopic::Routing,
            Self::AidConflict { .. }
            | Self::PolicyViolation { .. }
            | Self::UnroutableAids { .. } => EventTopic::Dispatch,
            Self::SessionDeactivated { .. } | Self::ObserveModeChanged { .. } => {
                EventTopic::Session
            }
        }
    }

    /// Get the originating component ID.
    #[must_use]
    pub fn source_component(&self) -> u8 {
        match self.topic() {
            EventTopic::Resolution => COMPONENT_RESOLUTION,
            EventTopic::Routing => COMPONENT_ROUTING,
            EventTopic::Dispatch | EventTopic::Session => COMPONENT_SESSION,
            EventTopic::All => COMPONENT_RUNTIME,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Component 1 events.
    Resolution,
    /// Component 2 events.
    Routing,
    /// Component 3 dispatch diagnostics (conflict, policy, unroutable).
    Dispatch,
    /// Component 3 lifecycle events.
    Session,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source components to include. Empty means all sources.
    pub source_components: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_components: Vec::new(),
        }
    }

    /// Create a filter for events from specific components.
    #[must_use]
    pub fn from_components(components: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            source_components: components,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &CardEmulationEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.source_components.is_empty()
            || self.source_components.contains(&event.source_component());

        topic_match && source_match
    }
}
