//! Error types for the Routing Table Synthesizer
//!
//! Controller errors never escape `configure_routing`; they are logged,
//! published as diagnostics and leave the committed table untouched.

use thiserror::Error;

/// Routing errors
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Controller rejected a route, unroute or commit call
    #[error("Controller {operation} failed: {reason}")]
    Controller {
        operation: &'static str,
        reason: String,
    },

    /// Matching mode outside 0..=3
    #[error("Invalid AID matching mode {0}")]
    InvalidMatchingMode(u8),

    /// Secure element name has no configured route
    #[error("Unknown secure element {0:?}")]
    UnknownSecureElement(String),
}

impl RoutingError {
    pub fn controller(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Controller {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
