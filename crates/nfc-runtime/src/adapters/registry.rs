//! # Static Service Registry
//!
//! Holds installed services per user in declaration order. The runtime
//! loads it from configuration and replaces a user's list on install or
//! removal.

use ce_01_aid_resolution::ServiceRegistry;
use parking_lot::RwLock;
use shared_types::{CardEmulationService, ComponentName, UserId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
pub struct StaticRegistry {
    services: RwLock<HashMap<UserId, Vec<CardEmulationService>>>,
}

impl StaticRegistry {
    /// Registry seeded from `services`, grouped by their `user_id`.
    pub fn from_services(services: impl IntoIterator<Item = CardEmulationService>) -> Self {
        let registry = Self::default();
        {
            let mut map = registry.services.write();
            for service in services {
                map.entry(service.user_id).or_default().push(service);
            }
        }
        registry
    }

    /// Replace every service of `user`.
    pub fn set_services(&self, user: UserId, services: Vec<CardEmulationService>) {
        debug!(user, count = services.len(), "Registry services replaced");
        self.services.write().insert(user, services);
    }

    /// Add or replace one service, keeping its position when it exists.
    pub fn install(&self, service: CardEmulationService) {
        let mut map = self.services.write();
        let list = map.entry(service.user_id).or_default();
        match list.iter_mut().find(|s| s.component == service.component) {
            Some(existing) => *existing = service,
            None => list.push(service),
        }
    }

    /// Remove `component` for `user`. Returns whether it was installed.
    pub fn uninstall(&self, user: UserId, component: &ComponentName) -> bool {
        let mut map = self.services.write();
        let Some(list) = map.get_mut(&user) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| &s.component != component);
        before != list.len()
    }
}

impl ServiceRegistry for StaticRegistry {
    fn installed_services(&self, user: UserId) -> Vec<CardEmulationService> {
        self.services.read().get(&user).cloned().unwrap_or_default()
    }
}
