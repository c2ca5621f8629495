//! # Routing Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ce-02-aid-routing = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ce_routing_commits_total` - Counter of committed tables
//! - `ce_routing_overflows_total` - Counter of aborted overflowing tables
//! - `ce_routing_controller_failures_total` - Counter of controller errors (by operation)
//! - `ce_routing_table_bytes` - Gauge of the committed table size

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Committed tables
    pub static ref COMMITS: IntCounter = register_int_counter!(
        "ce_routing_commits_total",
        "Total number of routing tables committed"
    )
    .expect("Failed to create COMMITS metric");

    /// Aborted overflowing tables
    pub static ref OVERFLOWS: IntCounter = register_int_counter!(
        "ce_routing_overflows_total",
        "Total number of routing tables aborted for lack of capacity"
    )
    .expect("Failed to create OVERFLOWS metric");

    /// Controller errors, labeled by operation
    pub static ref CONTROLLER_FAILURES: IntCounterVec = register_int_counter_vec!(
        "ce_routing_controller_failures_total",
        "Total number of failed controller routing calls",
        &["operation"]
    )
    .expect("Failed to create CONTROLLER_FAILURES metric");

    /// Size of the committed table
    pub static ref TABLE_BYTES: IntGauge = register_int_gauge!(
        "ce_routing_table_bytes",
        "Serialized size of the committed routing table"
    )
    .expect("Failed to create TABLE_BYTES metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a committed table
#[cfg(feature = "metrics")]
pub fn record_commit(size_bytes: usize) {
    COMMITS.inc();
    TABLE_BYTES.set(size_bytes as i64);
}

/// Record an aborted overflow
#[cfg(feature = "metrics")]
pub fn record_overflow() {
    OVERFLOWS.inc();
}

/// Record a controller failure
#[cfg(feature = "metrics")]
pub fn record_controller_failure(operation: &str) {
    CONTROLLER_FAILURES.with_label_values(&[operation]).inc();
}

/// Record that the committed table was forgotten
#[cfg(feature = "metrics")]
pub fn record_table_cleared() {
    TABLE_BYTES.set(0);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_commit(_size_bytes: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_overflow() {}

#[cfg(not(feature = "metrics"))]
pub fn record_controller_failure(_operation: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_table_cleared() {}
