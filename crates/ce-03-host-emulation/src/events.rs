//! Events processed by the session queue
//!
//! Radio notifications, service replies, bind callbacks, preference changes
//! and timer firings all arrive here and are handled one at a time.

use crate::ports::outbound::{BindingKind, ServiceChannel};
use shared_types::{ComponentName, PollingFrame, UserId};
use std::sync::Arc;

/// Deferred work scheduled by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Field stayed off; drop back to idle.
    ReturnToIdle,
    /// Turn observe mode back on after a one-off transaction.
    ReenableObserveMode,
    /// Observe mode is still on and no target app is in the foreground.
    AutoDisableObserveMode,
    /// Report SELECTed AIDs that nothing could answer.
    UnroutableReport,
}

/// One unit of work for the session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    // =========================================================================
    // RADIO
    // =========================================================================
    /// RF field appeared or disappeared.
    FieldChanged { on: bool },

    /// A reader activated ISO-DEP on the host.
    Activated,

    /// Command APDU from the reader.
    Data { apdu: Vec<u8> },

    /// The reader went away.
    Deactivated,

    /// A secure element answered a SELECT without the host.
    OffHostAidSelected,

    /// Batch of polling-loop frames.
    PollingLoop { frames: Vec<PollingFrame> },

    /// Observe mode changed underneath the session.
    ObserveModeChanged { enabled: bool },

    // =========================================================================
    // SERVICES
    // =========================================================================
    /// Response APDU from a bound service.
    ServiceResponse { from: ComponentName, apdu: Vec<u8> },

    /// A bound service declined the selected AID.
    ServiceUnhandled { from: ComponentName },

    /// A bind started by the session completed.
    ServiceBound {
        component: ComponentName,
        user: UserId,
        kind: BindingKind,
        epoch: u64,
        channel: Arc<dyn ServiceChannel>,
    },

    /// A bound service went away; the platform may reconnect it.
    ServiceDisconnected {
        component: ComponentName,
        kind: BindingKind,
    },

    /// A bound service's binding is dead for good.
    BindingDied {
        component: ComponentName,
        kind: BindingKind,
    },

    // =========================================================================
    // PREFERENCES
    // =========================================================================
    PreferredPaymentChanged {
        user: UserId,
        component: Option<ComponentName>,
    },

    PreferredForegroundChanged {
        user: UserId,
        component: Option<ComponentName>,
    },

    /// Registered services changed; rebuild the polling filter index.
    PollingFiltersChanged,

    // =========================================================================
    // TIMERS
    // =========================================================================
    Timer { kind: TimerKind, token: u64 },
}

impl SessionEvent {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            SessionEvent::FieldChanged { .. } => "field_changed",
            SessionEvent::Activated => "activated",
            SessionEvent::Data { .. } => "data",
            SessionEvent::Deactivated => "deactivated",
            SessionEvent::OffHostAidSelected => "off_host_selected",
            SessionEvent::PollingLoop { .. } => "polling_loop",
            SessionEvent::ObserveModeChanged { .. } => "observe_mode_changed",
            SessionEvent::ServiceResponse { .. } => "service_response",
            SessionEvent::ServiceUnhandled { .. } => "service_unhandled",
            SessionEvent::ServiceBound { .. } => "service_bound",
            SessionEvent::ServiceDisconnected { .. } => "service_disconnected",
            SessionEvent::BindingDied { .. } => "binding_died",
            SessionEvent::PreferredPaymentChanged { .. } => "preferred_payment_changed",
            SessionEvent::PreferredForegroundChanged { .. } => "preferred_foreground_changed",
            SessionEvent::PollingFiltersChanged => "polling_filters_changed",
            SessionEvent::Timer { .. } => "timer",
        }
    }
}
