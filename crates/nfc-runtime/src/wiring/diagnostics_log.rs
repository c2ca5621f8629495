//! # Diagnostics Log
//!
//! Subscribes to every bus topic and renders each diagnostic as one
//! structured log line. Failure diagnostics log at `warn`.

use nfc_telemetry::log_event;
use shared_bus::{CardEmulationEvent, Subscription};
use tracing::info;

/// Log diagnostics until the bus closes.
pub async fn run_diagnostics_log(mut subscription: Subscription) {
    info!("Diagnostics log started");
    while let Some(event) = subscription.recv().await {
        log_diagnostic(&event);
    }
    info!("Diagnostics log stopped");
}

/// Render one diagnostic.
pub fn log_diagnostic(event: &CardEmulationEvent) {
    let source = event.source_component();
    match event {
        CardEmulationEvent::ResolutionInvalidated { cause } => {
            log_event!(debug, "ce-01", "Resolution invalidated", cause = %cause, source = source);
        }
        CardEmulationEvent::RoutingCommitted {
            entries,
            size_bytes,
        } => {
            log_event!(info, "ce-02", "Routing committed", entries = entries, size_bytes = size_bytes);
        }
        CardEmulationEvent::RoutingOverflow {
            required_bytes,
            capacity_bytes,
        } => {
            log_event!(
                warn,
                "ce-02",
                "Routing table overflow",
                required_bytes = required_bytes,
                capacity_bytes = capacity_bytes
            );
        }
        CardEmulationEvent::RoutingCommitFailed { reason } => {
            log_event!(warn, "ce-02", "Routing commit failed", reason = %reason);
        }
        CardEmulationEvent::AidConflict {
            aid,
            candidates,
            category,
        } => {
            log_event!(
                warn,
                "ce-03",
                "AID conflict",
                aid = %aid,
                candidates = candidates.len(),
                category = %category
            );
        }
        CardEmulationEvent::PolicyViolation {
            aid,
            service,
            violation,
        } => {
            log_event!(
                warn,
                "ce-03",
                "Policy violation",
                aid = %aid,
                service = %service,
                violation = ?violation
            );
        }
        CardEmulationEvent::UnroutableAids { aids } => {
            log_event!(warn, "ce-03", "Unroutable AIDs", aids = ?aids);
        }
        CardEmulationEvent::SessionDeactivated {
            cycle_id,
            outcome,
            category,
        } => {
            log_event!(
                info,
                "ce-03",
                "Session deactivated",
                cycle_id = %cycle_id,
                outcome = outcome.as_str(),
                category = %category
            );
        }
        CardEmulationEvent::ObserveModeChanged { enabled } => {
            log_event!(info, "ce-03", "Observe mode changed", enabled = enabled);
        }
    }
}
