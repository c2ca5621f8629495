//! Driving Ports (API - Inbound)

use crate::domain::{RoutingDestination, RoutingOptions, RoutingTable};
use async_trait::async_trait;
use shared_types::{AidPattern, RouteAssignment};
use std::collections::BTreeMap;

/// Primary Routing API
///
/// Driven from the maintenance path after registry, role or foreground
/// changes; never from the APDU path.
#[async_trait]
pub trait AidRoutingApi: Send + Sync {
    /// Bring the controller table in line with `assignments`.
    ///
    /// Returns `false` only when nothing needed to change. Overflow and
    /// controller failures are absorbed and still return `true`.
    async fn configure_routing(
        &self,
        assignments: &BTreeMap<AidPattern, RouteAssignment>,
        force: bool,
    ) -> bool;

    /// The controller dropped its table; forget ours.
    async fn on_routing_table_cleared_by_controller(&self);

    /// NFC switched off; the controller table will not survive.
    async fn on_nfc_disabled(&self);

    /// Snapshot of the last committed table.
    async fn committed_table(&self) -> RoutingTable;

    async fn routing_options(&self) -> RoutingOptions;

    async fn override_default_route(&self, route: RoutingDestination);

    async fn override_default_iso_dep_route(&self, route: RoutingDestination);

    async fn override_default_offhost_route(&self, route: RoutingDestination);

    /// Drop all route overrides.
    async fn recover_override(&self);

    /// Whether registrations with a `*` marker can be routed natively.
    fn supports_prefix_matching(&self) -> bool;

    /// Whether registrations with a `#` marker can be routed natively.
    fn supports_subset_matching(&self) -> bool;
}
