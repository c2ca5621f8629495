//! Route identifiers and secure-element name mapping

use crate::error::{RoutingError, RoutingResult};
use serde::{Deserialize, Serialize};
use shared_types::RouteTarget;
use std::fmt;

/// Device host (DH) name used by routing configuration.
pub const DEVICE_HOST: &str = "DH";
/// Name prefix of embedded secure elements.
pub const SE_PREFIX_ESE: &str = "eSE";
/// Name prefix of UICC (SIM) secure elements.
pub const SE_PREFIX_SIM: &str = "SIM";

/// Controller execution environment id of a routing-table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingDestination(pub u8);

impl RoutingDestination {
    /// The host execution environment.
    pub const HOST: RoutingDestination = RoutingDestination(0x00);

    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl fmt::Display for RoutingDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "host")
        } else {
            write!(f, "0x{:02X}", self.0)
        }
    }
}

/// Route ids of the configured secure elements.
///
/// `eSE<n>` maps to `ese[n - 1]` and `SIM<n>` to `uicc[n - 1]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureElementRoutes {
    pub ese: Vec<u8>,
    pub uicc: Vec<u8>,
}

impl SecureElementRoutes {
    /// Route id of a named execution environment.
    pub fn lookup(&self, name: &str) -> RoutingResult<RoutingDestination> {
        if name == DEVICE_HOST {
            return Ok(RoutingDestination::HOST);
        }
        let indexed = |prefix: &str, routes: &[u8]| {
            name.strip_prefix(prefix)
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| routes.get(i).copied())
        };
        indexed(SE_PREFIX_ESE, &self.ese)
            .or_else(|| indexed(SE_PREFIX_SIM, &self.uicc))
            .map(RoutingDestination)
            .ok_or_else(|| RoutingError::UnknownSecureElement(name.to_string()))
    }

    /// Destination of a resolved target; unknown secure elements fall back
    /// to `default_offhost`.
    pub fn destination_for(
        &self,
        target: &RouteTarget,
        default_offhost: RoutingDestination,
    ) -> RoutingDestination {
        match target {
            RouteTarget::Host => RoutingDestination::HOST,
            RouteTarget::OffHost { secure_element } => {
                self.lookup(secure_element).unwrap_or(default_offhost)
            }
        }
    }
}
