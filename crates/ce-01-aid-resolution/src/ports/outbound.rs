//! Driven Ports (SPI - Outbound Dependencies)

use shared_types::{CardEmulationService, UserId};

/// Source of installed card emulation services.
///
/// ## Ordering contract
///
/// Implementations MUST return services in a stable declaration order.
/// That order is the tie-break whenever one owner (for example the wallet
/// role holder) has several eligible services for the same AID: the first
/// one returned wins.
pub trait ServiceRegistry: Send + Sync {
    /// Current services installed for `user`, in declaration order.
    fn installed_services(&self, user: UserId) -> Vec<CardEmulationService>;
}
