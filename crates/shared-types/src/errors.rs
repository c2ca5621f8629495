//! # Error Types
//!
//! Defines error types used across components.

use thiserror::Error;

/// Errors raised while parsing an AID registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AidFormatError {
    /// AID contains a non-hex character.
    #[error("AID contains non-hex characters: {aid}")]
    NotHex { aid: String },

    /// AID has an odd number of hex digits.
    #[error("AID has odd length {len}: {aid}")]
    OddLength { aid: String, len: usize },

    /// AID length outside the ISO/IEC 7816-5 range.
    #[error("AID length {len} outside {min}..={max} hex characters: {aid}")]
    BadLength {
        aid: String,
        len: usize,
        min: usize,
        max: usize,
    },
}

/// Errors raised while parsing a service component name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentNameError {
    /// Flattened name is missing the `package/class` separator.
    #[error("Component name missing '/': {0}")]
    MissingSeparator(String),

    /// Package or class part is empty.
    #[error("Component name has an empty part: {0}")]
    EmptyPart(String),
}
