//! Error types for the AID Resolution Engine
//!
//! `resolve` itself never fails; these errors describe registrations and
//! queries that are rejected before resolution and logged by the caller.

use shared_types::AidFormatError;
use thiserror::Error;

/// Resolution engine errors
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Queried AID is not a well-formed concrete AID
    #[error("Invalid AID {aid:?}: {source}")]
    InvalidAid {
        aid: String,
        #[source]
        source: AidFormatError,
    },

    /// Queried AID is shorter than the minimum resolvable length
    #[error("AID {aid:?} shorter than {min} hex characters")]
    AidTooShort { aid: String, min: usize },

    /// Registration skipped because the controller lacks the matching mode
    #[error("Registration {pattern} needs {mode} matching which the controller lacks")]
    UnsupportedMatching { pattern: String, mode: &'static str },
}

/// Result type for resolution operations
pub type ResolutionResult<T> = Result<T, ResolutionError>;
