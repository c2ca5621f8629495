//! # Session Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ce-03-host-emulation = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ce_session_apdus_forwarded_total` - Counter of command APDUs sent to services
//! - `ce_session_deactivations_total` - Counter of classified deactivations (by outcome)
//! - `ce_session_policy_rejections_total` - Counter of policy-gate rejections (by gate)
//! - `ce_session_polling_frames_total` - Counter of polling frames delivered to services
//! - `ce_session_state` - Gauge of the current session state code

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// APDUs forwarded to services
    pub static ref APDUS_FORWARDED: IntCounter = register_int_counter!(
        "ce_session_apdus_forwarded_total",
        "Total number of command APDUs forwarded to services"
    )
    .expect("Failed to create APDUS_FORWARDED metric");

    /// Deactivations, labeled by outcome
    pub static ref DEACTIVATIONS: IntCounterVec = register_int_counter_vec!(
        "ce_session_deactivations_total",
        "Total number of classified field deactivations",
        &["outcome"]
    )
    .expect("Failed to create DEACTIVATIONS metric");

    /// Policy rejections, labeled by gate
    pub static ref POLICY_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "ce_session_policy_rejections_total",
        "Total number of default services rejected by a policy gate",
        &["gate"]
    )
    .expect("Failed to create POLICY_REJECTIONS metric");

    /// Polling frames delivered
    pub static ref POLLING_FRAMES: IntCounter = register_int_counter!(
        "ce_session_polling_frames_total",
        "Total number of polling-loop frames delivered to services"
    )
    .expect("Failed to create POLLING_FRAMES metric");

    /// Current state code
    pub static ref STATE: IntGauge = register_int_gauge!(
        "ce_session_state",
        "Current emulation session state (0=idle .. 5=polling_loop)"
    )
    .expect("Failed to create STATE metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a forwarded command APDU
#[cfg(feature = "metrics")]
pub fn record_apdu_forwarded() {
    APDUS_FORWARDED.inc();
}

/// Record a classified deactivation
#[cfg(feature = "metrics")]
pub fn record_deactivation(outcome: &str) {
    DEACTIVATIONS.with_label_values(&[outcome]).inc();
}

/// Record a policy-gate rejection
#[cfg(feature = "metrics")]
pub fn record_policy_rejection(gate: &str) {
    POLICY_REJECTIONS.with_label_values(&[gate]).inc();
}

/// Record delivered polling frames
#[cfg(feature = "metrics")]
pub fn record_polling_frames(count: usize) {
    POLLING_FRAMES.inc_by(count as u64);
}

/// Record the current state
#[cfg(feature = "metrics")]
pub fn set_state(code: i64) {
    STATE.set(code);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_apdu_forwarded() {}

#[cfg(not(feature = "metrics"))]
pub fn record_deactivation(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_policy_rejection(_gate: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_polling_frames(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn set_state(_code: i64) {}
