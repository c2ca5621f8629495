//! Driving Ports (API - Inbound)

use crate::domain::AidResolution;
use shared_types::{
    AidPattern, CardEmulationService, ComponentName, PollingLoopFilter, RouteAssignment, UserId,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A polling-loop filter together with the service that declared it.
#[derive(Clone, Debug)]
pub struct RegisteredPollingFilter {
    pub service: Arc<CardEmulationService>,
    pub filter: PollingLoopFilter,
    /// `filter` is a regular expression rather than literal hex.
    pub is_pattern: bool,
}

/// Primary AID Resolution API
///
/// Queries are synchronous and side-effect free apart from filling the
/// resolution cache. Every `on_*` notification drops the cache.
pub trait AidResolutionApi: Send + Sync {
    /// Resolve a concrete AID received in a SELECT command.
    fn resolve(&self, aid: &str) -> AidResolution;

    /// Replace the service snapshot of `user`.
    fn on_services_updated(&self, user: UserId, services: Vec<CardEmulationService>);

    /// Re-read the snapshot of `user` from the registry.
    fn refresh_services(&self, user: UserId);

    /// Wallet role moved to `package` (or was released) for `user`.
    fn on_wallet_role_holder_changed(&self, package: Option<String>, user: UserId);

    /// Foreground app set (or cleared) its preferred service for `user`.
    fn on_preferred_foreground_service_changed(&self, user: UserId, component: Option<ComponentName>);

    fn on_nfc_enabled(&self);

    fn on_nfc_disabled(&self);

    /// Active user changed.
    fn on_user_switched(&self, user: UserId);

    /// Placement and power state of every pattern that has a candidate.
    fn routing_assignments(&self) -> BTreeMap<AidPattern, RouteAssignment>;

    /// Foreground service if set, else the wallet holder's first PAYMENT service.
    fn preferred_service(&self) -> Option<Arc<CardEmulationService>>;

    /// Descriptor of `component` for the current user.
    fn service(&self, component: &ComponentName) -> Option<Arc<CardEmulationService>>;

    /// Services of the current user in declaration order.
    fn services(&self) -> Vec<Arc<CardEmulationService>>;

    /// Literal and pattern polling-loop filters of the current user's services.
    fn polling_loop_filters(&self) -> Vec<RegisteredPollingFilter>;

    fn wallet_role_holder(&self) -> Option<String>;

    fn foreground_service(&self) -> Option<ComponentName>;

    fn current_user(&self) -> UserId;

    /// Whether any routed service needs the screen on.
    fn requires_screen_on_service_exists(&self) -> bool;

    fn is_radio_routing_active(&self) -> bool;

    /// Counter bumped on every invalidation.
    fn generation(&self) -> u64;
}
