//! AID Resolution Service - API implementation
//!
//! Wraps [`ResolutionState`] behind a `parking_lot::RwLock`. Lookups take the
//! read lock on a cache hit and the write lock only to fill the cache.

use crate::domain::{
    resolve_conflict, route_assignment, AidResolution, CapabilityFlags, ConflictContext,
};
use crate::error::ResolutionError;
use crate::metrics;
use crate::ports::inbound::{AidResolutionApi, RegisteredPollingFilter};
use crate::ports::outbound::ServiceRegistry;
use crate::state::ResolutionState;
use parking_lot::RwLock;
use shared_types::{
    AidPattern, CardEmulationService, ComponentName, RouteAssignment, UserId, MIN_AID_HEX_LEN,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolution engine configuration
#[derive(Clone, Debug)]
pub struct ResolutionConfig {
    /// Shortest AID (hex characters) that is resolved at all
    pub min_aid_hex_len: usize,
    /// Matching modes the controller supports
    pub capabilities: CapabilityFlags,
    /// Controller speaks NCI 2.0 (affects power-state computation)
    pub nci_version_2: bool,
    /// A lone eligible candidate becomes the default
    pub single_service_default: bool,
    /// User active at start-up
    pub initial_user: UserId,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            min_aid_hex_len: MIN_AID_HEX_LEN,
            capabilities: CapabilityFlags::default(),
            nci_version_2: true,
            single_service_default: true,
            initial_user: 0,
        }
    }
}

/// AID Resolution Engine
pub struct AidResolutionService<R: ServiceRegistry> {
    config: ResolutionConfig,
    state: Arc<RwLock<ResolutionState>>,
    registry: Arc<R>,
}

impl<R: ServiceRegistry> AidResolutionService<R> {
    pub fn new(config: ResolutionConfig, registry: Arc<R>) -> Self {
        let state = ResolutionState::new(config.initial_user);
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            registry,
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Normalise a queried AID, rejecting what can never match.
    fn normalize(&self, aid: &str) -> Result<String, ResolutionError> {
        let aid = aid.to_ascii_uppercase();
        if aid.len() < self.config.min_aid_hex_len {
            return Err(ResolutionError::AidTooShort {
                aid,
                min: self.config.min_aid_hex_len,
            });
        }
        if !aid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ResolutionError::InvalidAid {
                source: shared_types::AidFormatError::NotHex { aid: aid.clone() },
                aid,
            });
        }
        Ok(aid)
    }

    fn context<'a>(&self, state: &'a ResolutionState) -> ConflictContext<'a> {
        ConflictContext {
            wallet_holder: state.wallet_holder_for_current_user(),
            foreground: state.foreground_for_current_user(),
            radio_routing_active: state.radio_routing_active,
            single_service_default: self.config.single_service_default,
        }
    }

    fn install_snapshot(&self, state: &mut ResolutionState, user: UserId, services: Vec<CardEmulationService>) {
        let services: Vec<Arc<CardEmulationService>> = services.into_iter().map(Arc::new).collect();
        debug!(user, count = services.len(), "Service snapshot installed");
        state.services_by_user.insert(user, services);
        if user == state.current_user {
            state.rebuild_map(self.config.capabilities);
            metrics::record_skipped_registrations(state.service_map.skipped());
        }
    }

    fn invalidate(&self, state: &mut ResolutionState, cause: &str) {
        state.invalidate();
        metrics::record_invalidation();
        debug!(cause, generation = state.generation, "Resolution cache invalidated");
    }
}

impl<R: ServiceRegistry> AidResolutionApi for AidResolutionService<R> {
    fn resolve(&self, aid: &str) -> AidResolution {
        let aid = match self.normalize(aid) {
            Ok(aid) => aid,
            Err(err) => {
                debug!(error = %err, "AID not resolvable");
                metrics::record_lookup("none", false);
                return AidResolution::None;
            }
        };

        if let Some(cached) = self.state.read().cache.get(&aid) {
            metrics::record_lookup(cached.outcome_label(), true);
            return cached.clone();
        }

        let mut state = self.state.write();
        let candidates = state.service_map.candidates_for_aid(&aid);
        let resolution = resolve_conflict(candidates, &self.context(&state));
        debug!(
            aid = %aid,
            outcome = resolution.outcome_label(),
            candidates = resolution.services().len(),
            "Resolved AID"
        );
        metrics::record_lookup(resolution.outcome_label(), false);
        state.cache.insert(aid, resolution.clone());
        resolution
    }

    fn on_services_updated(&self, user: UserId, services: Vec<CardEmulationService>) {
        let mut state = self.state.write();
        self.install_snapshot(&mut state, user, services);
        self.invalidate(&mut state, "services_updated");
    }

    fn refresh_services(&self, user: UserId) {
        let services = self.registry.installed_services(user);
        self.on_services_updated(user, services);
    }

    fn on_wallet_role_holder_changed(&self, package: Option<String>, user: UserId) {
        info!(?package, user, "Wallet role holder changed");
        let mut state = self.state.write();
        state.wallet_holder = package.map(|p| (p, user));
        self.invalidate(&mut state, "wallet_role_changed");
    }

    fn on_preferred_foreground_service_changed(&self, user: UserId, component: Option<ComponentName>) {
        debug!(user, component = ?component.as_ref().map(ToString::to_string), "Foreground preference changed");
        let mut state = self.state.write();
        state.foreground = component.map(|c| (user, c));
        self.invalidate(&mut state, "foreground_changed");
    }

    fn on_nfc_enabled(&self) {
        let mut state = self.state.write();
        state.radio_routing_active = true;
        self.invalidate(&mut state, "nfc_enabled");
    }

    fn on_nfc_disabled(&self) {
        let mut state = self.state.write();
        state.radio_routing_active = false;
        self.invalidate(&mut state, "nfc_disabled");
    }

    fn on_user_switched(&self, user: UserId) {
        let missing = !self.state.read().services_by_user.contains_key(&user);
        let fetched = if missing {
            Some(self.registry.installed_services(user))
        } else {
            None
        };

        let mut state = self.state.write();
        state.current_user = user;
        match fetched {
            Some(services) => self.install_snapshot(&mut state, user, services),
            None => state.rebuild_map(self.config.capabilities),
        }
        info!(user, "Switched active user");
        self.invalidate(&mut state, "user_switched");
    }

    fn routing_assignments(&self) -> BTreeMap<AidPattern, RouteAssignment> {
        let state = self.state.read();
        let ctx = self.context(&state);
        state
            .service_map
            .patterns()
            .filter_map(|pattern| {
                let candidates = state.service_map.candidates_for_pattern(pattern);
                let resolution = resolve_conflict(candidates, &ctx);
                route_assignment(&resolution, self.config.nci_version_2)
                    .map(|assignment| (pattern.clone(), assignment))
            })
            .collect()
    }

    fn preferred_service(&self) -> Option<Arc<CardEmulationService>> {
        let state = self.state.read();
        if let Some(foreground) = state.foreground_for_current_user() {
            if let Some(service) = state.current_services().iter().find(|s| &s.component == foreground) {
                return Some(service.clone());
            }
        }
        let holder = state.wallet_holder_for_current_user()?;
        state
            .current_services()
            .iter()
            .find(|s| s.package() == holder && s.has_payment_registrations())
            .cloned()
    }

    fn service(&self, component: &ComponentName) -> Option<Arc<CardEmulationService>> {
        self.state
            .read()
            .current_services()
            .iter()
            .find(|s| &s.component == component)
            .cloned()
    }

    fn services(&self) -> Vec<Arc<CardEmulationService>> {
        self.state.read().current_services().to_vec()
    }

    fn polling_loop_filters(&self) -> Vec<RegisteredPollingFilter> {
        let state = self.state.read();
        let mut filters = Vec::new();
        for service in state.current_services() {
            for filter in &service.polling_loop_filters {
                filters.push(RegisteredPollingFilter {
                    service: service.clone(),
                    filter: filter.clone(),
                    is_pattern: false,
                });
            }
            for filter in &service.polling_loop_pattern_filters {
                filters.push(RegisteredPollingFilter {
                    service: service.clone(),
                    filter: filter.clone(),
                    is_pattern: true,
                });
            }
        }
        filters
    }

    fn wallet_role_holder(&self) -> Option<String> {
        self.state.read().wallet_holder_for_current_user().map(str::to_owned)
    }

    fn foreground_service(&self) -> Option<ComponentName> {
        self.state.read().foreground_for_current_user().cloned()
    }

    fn current_user(&self) -> UserId {
        self.state.read().current_user
    }

    fn requires_screen_on_service_exists(&self) -> bool {
        self.state
            .read()
            .current_services()
            .iter()
            .any(|s| s.requires_screen_on && !s.registrations.is_empty())
    }

    fn is_radio_routing_active(&self) -> bool {
        self.state.read().radio_routing_active
    }

    fn generation(&self) -> u64 {
        self.state.read().generation
    }
}
