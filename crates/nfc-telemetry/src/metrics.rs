//! Prometheus metrics for the card emulation runtime.
//!
//! All metrics follow the naming convention: `nfc_<area>_<metric>_<unit>`.
//! Component crates register their own `ce_*` metrics in the default
//! registry when built with their `metrics` feature; `encode_metrics`
//! exports both registries.
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., diagnostic events)
//! - **Histogram**: Distribution of values (e.g., APDU dispatch latency)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Runtime metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DIAGNOSTICS BUS
    // =========================================================================

    /// Diagnostic events observed by the runtime log sink
    pub static ref DIAGNOSTIC_EVENTS: CounterVec = CounterVec::new(
        Opts::new("nfc_diagnostics_events_total", "Diagnostic events by topic"),
        &["topic"]
    ).expect("metric creation failed");

    // =========================================================================
    // SESSION QUEUE
    // =========================================================================

    /// Events enqueued for the emulation session
    pub static ref SESSION_EVENTS_QUEUED: Counter = Counter::new(
        "nfc_session_events_queued_total",
        "Total events enqueued for the emulation session"
    ).expect("metric creation failed");

    /// Time from radio data arrival to the session finishing its handling
    pub static ref APDU_DISPATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "nfc_apdu_dispatch_duration_seconds",
            "Time spent dispatching a command APDU"
        ).buckets(exponential_buckets(0.00005, 2.0, 14).expect("valid bucket layout"))
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register runtime metrics with the runtime registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DIAGNOSTIC_EVENTS.clone()),
        Box::new(SESSION_EVENTS_QUEUED.clone()),
        Box::new(APDU_DISPATCH_DURATION.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode runtime and component metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut metric_families = REGISTRY.gather();
    metric_families.extend(prometheus::gather());
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // May fail if already registered by another test, which is fine
        let _ = register_metrics();
    }

    #[test]
    fn test_counter_increment() {
        DIAGNOSTIC_EVENTS.with_label_values(&["routing"]).inc();
        assert!(DIAGNOSTIC_EVENTS.with_label_values(&["routing"]).get() >= 1.0);
    }

    #[test]
    fn test_dispatch_histogram_observes() {
        let before = APDU_DISPATCH_DURATION.get_sample_count();
        APDU_DISPATCH_DURATION.observe(0.0002);
        assert!(APDU_DISPATCH_DURATION.get_sample_count() > before);
    }

    #[test]
    fn test_encode_after_register() {
        let _ = register_metrics();
        SESSION_EVENTS_QUEUED.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("nfc_session_events_queued_total"));
    }
}
