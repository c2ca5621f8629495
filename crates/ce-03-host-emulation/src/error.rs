//! Error types for the Emulation Session
//!
//! Adapter failures are absorbed by the session: logged, answered with a
//! protocol-level reply where one is due, and never propagated to the radio.

use shared_types::ComponentName;
use thiserror::Error;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The platform refused to start a service bind
    #[error("Bind to {component} failed: {reason}")]
    Bind {
        component: ComponentName,
        reason: String,
    },

    /// A bound service's channel is gone
    #[error("Service {component} unreachable: {reason}")]
    ServiceUnreachable {
        component: ComponentName,
        reason: String,
    },

    /// The controller rejected a response or observe-mode change
    #[error("Radio {operation} failed: {reason}")]
    Radio {
        operation: &'static str,
        reason: String,
    },

    /// The session event queue has shut down
    #[error("Session queue closed")]
    QueueClosed,
}

impl SessionError {
    pub fn radio(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Radio {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for session adapter calls
pub type SessionResult<T> = Result<T, SessionError>;
