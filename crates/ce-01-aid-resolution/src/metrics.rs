//! # Resolution Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ce-01-aid-resolution = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ce_resolution_lookups_total` - Counter of resolve calls (by outcome)
//! - `ce_resolution_cache_hits_total` - Counter of resolve calls served from cache
//! - `ce_resolution_invalidations_total` - Counter of cache invalidations
//! - `ce_resolution_skipped_registrations_total` - Counter of registrations dropped while indexing

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Resolve calls, labeled by outcome (default, ambiguous, none)
    pub static ref LOOKUPS: IntCounterVec = register_int_counter_vec!(
        "ce_resolution_lookups_total",
        "Total number of AID resolutions",
        &["outcome"]
    )
    .expect("Failed to create LOOKUPS metric");

    /// Resolve calls served from cache
    pub static ref CACHE_HITS: IntCounter = register_int_counter!(
        "ce_resolution_cache_hits_total",
        "Total number of AID resolutions served from cache"
    )
    .expect("Failed to create CACHE_HITS metric");

    /// Cache invalidations
    pub static ref INVALIDATIONS: IntCounter = register_int_counter!(
        "ce_resolution_invalidations_total",
        "Total number of resolution cache invalidations"
    )
    .expect("Failed to create INVALIDATIONS metric");

    /// Registrations dropped while building the service map
    pub static ref SKIPPED_REGISTRATIONS: IntCounter = register_int_counter!(
        "ce_resolution_skipped_registrations_total",
        "Total number of AID registrations skipped while indexing"
    )
    .expect("Failed to create SKIPPED_REGISTRATIONS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a resolve call and its outcome
#[cfg(feature = "metrics")]
pub fn record_lookup(outcome: &str, cached: bool) {
    LOOKUPS.with_label_values(&[outcome]).inc();
    if cached {
        CACHE_HITS.inc();
    }
}

/// Record a cache invalidation
#[cfg(feature = "metrics")]
pub fn record_invalidation() {
    INVALIDATIONS.inc();
}

/// Record registrations skipped while indexing
#[cfg(feature = "metrics")]
pub fn record_skipped_registrations(count: usize) {
    SKIPPED_REGISTRATIONS.inc_by(count as u64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_lookup(_outcome: &str, _cached: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn record_invalidation() {}

#[cfg(not(feature = "metrics"))]
pub fn record_skipped_registrations(_count: usize) {}
