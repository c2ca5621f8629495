//! Driven Ports (SPI - Outbound Dependencies)

use crate::domain::RoutingDestination;
use crate::error::RoutingResult;
use async_trait::async_trait;
use shared_bus::CardEmulationEvent;
use shared_types::PowerState;

/// NCI version byte of NFC Controller Interface 2.0.
pub const NCI_VERSION_2_0: u8 = 0x20;

/// NFC controller routing-table interface
///
/// Calls may be slow (driver I/O) and must stay off the APDU path.
#[async_trait]
pub trait RoutingController: Send + Sync {
    /// Add or replace one routing-table row.
    async fn route_aid(
        &self,
        aid: &str,
        route: RoutingDestination,
        aid_type: u8,
        power_state: PowerState,
    ) -> RoutingResult<()>;

    /// Remove one routing-table row.
    async fn unroute_aid(&self, aid: &str) -> RoutingResult<()>;

    /// Apply pending route/unroute calls.
    async fn commit_routing(&self) -> RoutingResult<()>;

    fn supports_prefix_matching(&self) -> bool;

    fn supports_subset_matching(&self) -> bool;

    /// NCI version byte (`0x10`, `0x20`, ...).
    fn protocol_version(&self) -> u8;

    /// Free routing-table space in bytes with the current table programmed.
    fn remaining_table_capacity(&self) -> usize;
}

/// Fire-and-forget diagnostics
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: CardEmulationEvent);
}
