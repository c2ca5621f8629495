//! # Routing Maintenance
//!
//! The maintenance path: every registry, role, foreground or NFC-state
//! change is applied to the resolution engine, forwarded to the session
//! where it matters, and followed by one `configure_routing` call. None of
//! this runs on the APDU path.
//!
//! ```text
//! MaintenanceEvent ──→ Resolution (1) ──routing_assignments──→ Routing (2)
//!                           │
//!                           └──filters / payment / foreground──→ Session (3)
//! ```

use std::sync::Arc;

use ce_01_aid_resolution::AidResolutionApi;
use ce_02_aid_routing::AidRoutingApi;
use ce_03_host_emulation::{HostEmulationApi, SessionHandle, SessionResult};
use nfc_telemetry::log_event;
use shared_bus::CardEmulationEvent;
use shared_types::{ComponentName, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::adapters::BusDiagnostics;
use crate::container::{CardEmulationStack, ResolutionEngine, RoutingSynthesizer};

/// Change notifications that drive routing maintenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaintenanceEvent {
    /// The registry's service list for `user` changed.
    ServicesChanged { user: UserId },
    WalletRoleChanged {
        package: Option<String>,
        user: UserId,
    },
    ForegroundChanged {
        user: UserId,
        component: Option<ComponentName>,
    },
    UserSwitched { user: UserId },
    NfcEnabled,
    NfcDisabled,
    /// The controller lost its routing table (reset, firmware reload).
    ControllerTableCleared,
}

impl MaintenanceEvent {
    /// Cause label published with the resolution invalidation.
    pub fn cause(&self) -> &'static str {
        match self {
            Self::ServicesChanged { .. } => "services_updated",
            Self::WalletRoleChanged { .. } => "wallet_role_changed",
            Self::ForegroundChanged { .. } => "foreground_changed",
            Self::UserSwitched { .. } => "user_switched",
            Self::NfcEnabled => "nfc_enabled",
            Self::NfcDisabled => "nfc_disabled",
            Self::ControllerTableCleared => "controller_table_cleared",
        }
    }
}

/// Applies maintenance events in order.
pub struct MaintenanceCoordinator {
    resolver: Arc<ResolutionEngine>,
    routing: Arc<RoutingSynthesizer>,
    session: SessionHandle,
    diagnostics: Arc<BusDiagnostics>,
    /// Payment service last announced to the session.
    payment_service: Option<ComponentName>,
}

impl MaintenanceCoordinator {
    pub fn new(stack: &CardEmulationStack) -> Self {
        Self {
            resolver: Arc::clone(&stack.resolver),
            routing: Arc::clone(&stack.routing),
            session: stack.session.clone(),
            diagnostics: Arc::clone(&stack.diagnostics),
            payment_service: None,
        }
    }

    /// Apply one event. Returns whether the routing table was reprogrammed.
    pub async fn apply(&mut self, event: MaintenanceEvent) -> bool {
        debug!(?event, "Maintenance event");
        let cause = event.cause();
        let mut force = false;

        match event {
            MaintenanceEvent::ServicesChanged { user } => {
                self.resolver.refresh_services(user);
                self.notify_session(self.session.on_polling_loop_filters_changed());
                self.sync_payment_service();
            }
            MaintenanceEvent::WalletRoleChanged { package, user } => {
                self.resolver.on_wallet_role_holder_changed(package, user);
                self.sync_payment_service();
            }
            MaintenanceEvent::ForegroundChanged { user, component } => {
                self.resolver
                    .on_preferred_foreground_service_changed(user, component.clone());
                self.notify_session(
                    self.session
                        .on_preferred_foreground_service_changed(user, component),
                );
            }
            MaintenanceEvent::UserSwitched { user } => {
                self.resolver.on_user_switched(user);
                self.notify_session(self.session.on_polling_loop_filters_changed());
                self.sync_payment_service();
            }
            MaintenanceEvent::NfcEnabled => {
                self.resolver.on_nfc_enabled();
                self.sync_payment_service();
                force = true;
            }
            MaintenanceEvent::NfcDisabled => {
                self.resolver.on_nfc_disabled();
                self.routing.on_nfc_disabled().await;
                self.publish_invalidation(cause);
                return false;
            }
            MaintenanceEvent::ControllerTableCleared => {
                self.routing.on_routing_table_cleared_by_controller().await;
                force = true;
            }
        }

        self.publish_invalidation(cause);
        let assignments = self.resolver.routing_assignments();
        let changed = self.routing.configure_routing(&assignments, force).await;
        log_event!(
            info,
            "runtime",
            "Routing maintenance done",
            cause = cause,
            assignments = assignments.len(),
            changed = changed
        );
        changed
    }

    /// Apply events until every sender is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<MaintenanceEvent>) {
        info!("Routing maintenance started");
        while let Some(event) = rx.recv().await {
            self.apply(event).await;
        }
        info!("Routing maintenance stopped");
    }

    /// Tell the session when the wallet holder's payment service changes.
    fn sync_payment_service(&mut self) {
        let current = self.wallet_payment_service();
        if current == self.payment_service {
            return;
        }
        info!(
            from = ?self.payment_service.as_ref().map(ToString::to_string),
            to = ?current.as_ref().map(ToString::to_string),
            "Preferred payment service changed"
        );
        self.payment_service = current.clone();
        self.notify_session(
            self.session
                .on_preferred_payment_service_changed(self.resolver.current_user(), current),
        );
    }

    /// First host-resident PAYMENT service of the wallet role holder.
    fn wallet_payment_service(&self) -> Option<ComponentName> {
        let holder = self.resolver.wallet_role_holder()?;
        self.resolver
            .services()
            .into_iter()
            .find(|s| s.package() == holder && s.on_host && s.has_payment_registrations())
            .map(|s| s.component.clone())
    }

    fn publish_invalidation(&self, cause: &str) {
        self.diagnostics
            .publish(CardEmulationEvent::ResolutionInvalidated {
                cause: cause.to_string(),
            });
    }

    fn notify_session(&self, result: SessionResult<()>) {
        if let Err(e) = result {
            log_event!(warn, "runtime", "Session notification dropped", error = %e);
        }
    }
}
