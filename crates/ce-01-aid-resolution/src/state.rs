use crate::domain::{AidResolution, AidServiceMap, CapabilityFlags};
use shared_types::{CardEmulationService, ComponentName, UserId};
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable inputs of the resolution engine plus its derived cache.
///
/// Every input change goes through [`ResolutionState::invalidate`]; the
/// cache is never patched.
pub struct ResolutionState {
    /// Service snapshots per user, in registry declaration order
    pub services_by_user: HashMap<UserId, Vec<Arc<CardEmulationService>>>,
    /// User whose services are resolved
    pub current_user: UserId,
    /// Filtered registration index for `current_user`
    pub service_map: AidServiceMap,
    /// Wallet-role holder package and the user it holds the role for
    pub wallet_holder: Option<(String, UserId)>,
    /// Foreground-preferred service and its user
    pub foreground: Option<(UserId, ComponentName)>,
    /// NFC fully enabled, hardware routing programmable
    pub radio_routing_active: bool,
    /// Resolutions keyed by queried AID
    pub cache: HashMap<String, AidResolution>,
    /// Bumped on every invalidation
    pub generation: u64,
}

impl ResolutionState {
    pub fn new(initial_user: UserId) -> Self {
        Self {
            services_by_user: HashMap::new(),
            current_user: initial_user,
            service_map: AidServiceMap::default(),
            wallet_holder: None,
            foreground: None,
            radio_routing_active: false,
            cache: HashMap::new(),
            generation: 0,
        }
    }

    /// Services of the current user.
    pub fn current_services(&self) -> &[Arc<CardEmulationService>] {
        self.services_by_user
            .get(&self.current_user)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Wallet holder package if it holds the role for the current user.
    pub fn wallet_holder_for_current_user(&self) -> Option<&str> {
        match &self.wallet_holder {
            Some((package, user)) if *user == self.current_user => Some(package.as_str()),
            _ => None,
        }
    }

    /// Foreground service if it belongs to the current user.
    pub fn foreground_for_current_user(&self) -> Option<&ComponentName> {
        match &self.foreground {
            Some((user, component)) if *user == self.current_user => Some(component),
            _ => None,
        }
    }

    /// Rebuild the registration index for the current user.
    pub fn rebuild_map(&mut self, caps: CapabilityFlags) {
        self.service_map = AidServiceMap::build(self.current_services(), caps);
    }

    /// Drop every cached resolution.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}
