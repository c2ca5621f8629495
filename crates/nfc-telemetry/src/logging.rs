//! Structured logging helpers.
//!
//! Log records carry consistent fields so a shipper can index them:
//! - `subsystem`: component identifier (`ce-01`, `ce-02`, `ce-03`, `runtime`)
//! - `aid`: AID involved, when there is one
//! - `component`: card emulation service involved, when there is one

/// Helper to create structured log entries with consistent formatting.
#[macro_export]
macro_rules! log_event {
    // Info level with subsystem
    (info, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    // Warn level with subsystem
    (warn, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    // Error level with subsystem
    (error, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    // Debug level with subsystem
    (debug, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an AID-related event with standard fields.
#[macro_export]
macro_rules! log_aid_event {
    ($level:ident, $subsystem:expr, $msg:expr, $aid:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            aid = %$aid,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a service-related event with standard fields.
#[macro_export]
macro_rules! log_service_event {
    ($level:ident, $subsystem:expr, $msg:expr, $component:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            component = %$component,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand_without_subscriber() {
        let aid = "A0000000041010";
        crate::log_event!(info, "runtime", "starting", version = 1);
        crate::log_aid_event!(debug, "ce-03", "select", aid, state = "xfer");
        crate::log_service_event!(warn, "ce-03", "bind failed", "com.example/.Svc");
    }
}
