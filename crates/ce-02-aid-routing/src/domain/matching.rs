//! Controller AID matching modes and pattern encoding

use crate::error::RoutingError;
use serde::{Deserialize, Serialize};
use shared_types::{AidMatchKind, AidPattern};

/// Type flag for a prefix row.
pub const AID_TYPE_PREFIX: u8 = 0x10;
/// Type flag for a subset row.
pub const AID_TYPE_SUBSET: u8 = 0x20;
/// Type flag for an exact row.
pub const AID_TYPE_EXACT: u8 = 0x00;

/// How the controller matches routing-table AIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AidMatchingMode {
    ExactOnly = 0,
    ExactOrPrefix = 1,
    /// Every row is matched as a prefix.
    PrefixOnly = 2,
    ExactOrSubsetOrPrefix = 3,
}

impl AidMatchingMode {
    /// Mode implied by the controller's capability answers.
    pub fn from_capabilities(prefix: bool, subset: bool) -> Self {
        match (prefix, subset) {
            (true, true) => Self::ExactOrSubsetOrPrefix,
            (true, false) => Self::ExactOrPrefix,
            _ => Self::ExactOnly,
        }
    }

    pub fn supports_prefix(self) -> bool {
        !matches!(self, Self::ExactOnly)
    }

    pub fn supports_subset(self) -> bool {
        matches!(self, Self::ExactOrSubsetOrPrefix)
    }

    /// AID string and type flags passed to the controller for `pattern`.
    ///
    /// Natively supported prefix/subset patterns lose their marker and carry
    /// the kind in the flags; otherwise the pattern goes out verbatim.
    pub fn encode(self, pattern: &AidPattern) -> (String, u8) {
        match pattern.kind() {
            AidMatchKind::Exact => (pattern.body().to_string(), AID_TYPE_EXACT),
            AidMatchKind::Prefix if self.supports_prefix() => {
                (pattern.body().to_string(), AID_TYPE_PREFIX)
            }
            AidMatchKind::Subset if self.supports_subset() => {
                (pattern.body().to_string(), AID_TYPE_SUBSET)
            }
            _ => (pattern.to_string(), AID_TYPE_EXACT),
        }
    }

    /// Type flags of the empty catch-all row.
    pub fn catch_all_flags(self) -> u8 {
        if self.supports_prefix() {
            AID_TYPE_PREFIX
        } else {
            AID_TYPE_EXACT
        }
    }
}

impl TryFrom<u8> for AidMatchingMode {
    type Error = RoutingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ExactOnly),
            1 => Ok(Self::ExactOrPrefix),
            2 => Ok(Self::PrefixOnly),
            3 => Ok(Self::ExactOrSubsetOrPrefix),
            other => Err(RoutingError::InvalidMatchingMode(other)),
        }
    }
}

impl From<AidMatchingMode> for u8 {
    fn from(mode: AidMatchingMode) -> Self {
        mode as u8
    }
}
