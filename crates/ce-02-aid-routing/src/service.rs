//! Routing Table Synthesizer - API implementation
//!
//! One `tokio::sync::Mutex` serializes maintenance calls; the committed
//! table only changes after a successful controller commit.

use crate::domain::{
    synthesize, AidMatchingMode, RoutingDestination, RoutingOptions, RoutingRow, RoutingTable,
    SecureElementRoutes, SynthesisParams,
};
use crate::error::RoutingError;
use crate::metrics;
use crate::ports::inbound::AidRoutingApi;
use crate::ports::outbound::{DiagnosticsSink, RoutingController, NCI_VERSION_2_0};
use crate::state::RoutingState;
use async_trait::async_trait;
use shared_bus::CardEmulationEvent;
use shared_types::{AidPattern, RouteAssignment};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Routing configuration
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    /// Route for AIDs with no explicit row
    pub default_route: RoutingDestination,
    /// Route for ISO-DEP traffic with no AID match
    pub default_iso_dep_route: RoutingDestination,
    /// Route for off-host services whose secure element is unknown
    pub default_offhost_route: RoutingDestination,
    /// Route ids of the named secure elements
    pub secure_elements: SecureElementRoutes,
    /// Matching mode; derived from controller capabilities when `None`
    pub matching_mode: Option<AidMatchingMode>,
    /// Retry an overflowing table with the default route moved off-host
    pub auto_change_enabled: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_route: RoutingDestination::HOST,
            default_iso_dep_route: RoutingDestination::HOST,
            default_offhost_route: RoutingDestination::HOST,
            secure_elements: SecureElementRoutes::default(),
            matching_mode: None,
            auto_change_enabled: true,
        }
    }
}

impl RoutingConfig {
    pub fn options(&self) -> RoutingOptions {
        RoutingOptions {
            default_route: self.default_route,
            default_iso_dep_route: self.default_iso_dep_route,
            default_offhost_route: self.default_offhost_route,
            auto_change_enabled: self.auto_change_enabled,
            overrides: Default::default(),
        }
    }
}

/// Routing Table Synthesizer
pub struct AidRoutingService<C: RoutingController, D: DiagnosticsSink> {
    config: RoutingConfig,
    state: Mutex<RoutingState>,
    controller: Arc<C>,
    diagnostics: Arc<D>,
}

impl<C: RoutingController, D: DiagnosticsSink> AidRoutingService<C, D> {
    pub fn new(config: RoutingConfig, controller: Arc<C>, diagnostics: Arc<D>) -> Self {
        let state = RoutingState::new(config.options());
        Self {
            config,
            state: Mutex::new(state),
            controller,
            diagnostics,
        }
    }

    /// Effective matching mode.
    pub fn matching_mode(&self) -> AidMatchingMode {
        self.config.matching_mode.unwrap_or_else(|| {
            AidMatchingMode::from_capabilities(
                self.controller.supports_prefix_matching(),
                self.controller.supports_subset_matching(),
            )
        })
    }

    fn nci_version_2(&self) -> bool {
        self.controller.protocol_version() >= NCI_VERSION_2_0
    }

    /// Program `unroute` then `route` and commit. Stops at the first error.
    async fn apply(&self, unroute: &[String], route: &[RoutingRow]) -> Result<(), RoutingError> {
        for aid in unroute {
            debug!(aid = %aid, "Unrouting AID");
            self.controller.unroute_aid(aid).await?;
        }
        for row in route {
            debug!(
                aid = %row.aid,
                route = %row.route,
                power = %row.power_state,
                aid_type = row.aid_type,
                "Routing AID"
            );
            self.controller
                .route_aid(&row.aid, row.route, row.aid_type, row.power_state)
                .await?;
        }
        self.controller.commit_routing().await
    }

    fn absorb(&self, err: RoutingError) {
        let operation = match &err {
            RoutingError::Controller { operation, .. } => *operation,
            _ => "other",
        };
        warn!(error = %err, "Routing update failed; committed table unchanged");
        metrics::record_controller_failure(operation);
        self.diagnostics.emit(CardEmulationEvent::RoutingCommitFailed {
            reason: err.to_string(),
        });
    }
}

#[async_trait]
impl<C, D> AidRoutingApi for AidRoutingService<C, D>
where
    C: RoutingController + 'static,
    D: DiagnosticsSink + 'static,
{
    async fn configure_routing(
        &self,
        assignments: &BTreeMap<AidPattern, RouteAssignment>,
        force: bool,
    ) -> bool {
        let mut state = self.state.lock().await;
        let mode = self.matching_mode();
        let nci_version_2 = self.nci_version_2();

        let build = |options: &RoutingOptions| {
            synthesize(
                assignments,
                &SynthesisParams {
                    options,
                    secure_elements: &self.config.secure_elements,
                    mode,
                    nci_version_2,
                },
            )
        };

        let mut desired = build(&state.options);
        if desired == state.committed && !force {
            debug!(entries = desired.len(), "Routing table unchanged, not updating");
            return false;
        }

        let capacity = self.controller.remaining_table_capacity() + state.committed.size_bytes();
        let required = desired.size_bytes();
        if required > capacity {
            let mut fitted = false;
            if state.options.auto_change_enabled {
                let retry = build(&state.options.with_offhost_default());
                if retry.size_bytes() <= capacity {
                    info!(
                        required,
                        capacity,
                        retry_bytes = retry.size_bytes(),
                        "Table fits with default route moved off-host"
                    );
                    desired = retry;
                    fitted = true;
                }
            }
            if !fitted {
                if nci_version_2 {
                    info!(required, capacity, "Committing oversize table; controller resizes");
                } else {
                    warn!(required, capacity, "Routing table overflow; keeping previous table");
                    metrics::record_overflow();
                    self.diagnostics.emit(CardEmulationEvent::RoutingOverflow {
                        required_bytes: required,
                        capacity_bytes: capacity,
                    });
                    return true;
                }
            }
            if desired == state.committed && !force {
                return false;
            }
        }

        let diff = state.committed.diff(&desired);
        let route = if diff.is_empty() {
            desired.programming_order()
        } else {
            diff.route
        };

        if let Err(err) = self.apply(&diff.unroute, &route).await {
            self.absorb(err);
            return true;
        }

        let size_bytes = desired.size_bytes();
        let entries = desired.len();
        state.committed = desired;
        state.commits += 1;
        metrics::record_commit(size_bytes);
        info!(
            entries,
            size_bytes,
            unrouted = diff.unroute.len(),
            routed = route.len(),
            "Routing table committed"
        );
        self.diagnostics
            .emit(CardEmulationEvent::RoutingCommitted { entries, size_bytes });
        true
    }

    async fn on_routing_table_cleared_by_controller(&self) {
        let mut state = self.state.lock().await;
        state.committed.clear();
        metrics::record_table_cleared();
        info!("Controller cleared its routing table");
    }

    async fn on_nfc_disabled(&self) {
        let mut state = self.state.lock().await;
        state.committed.clear();
        metrics::record_table_cleared();
        debug!("NFC disabled; committed routing table forgotten");
    }

    async fn committed_table(&self) -> RoutingTable {
        self.state.lock().await.committed.clone()
    }

    async fn routing_options(&self) -> RoutingOptions {
        self.state.lock().await.options.clone()
    }

    async fn override_default_route(&self, route: RoutingDestination) {
        self.state.lock().await.options.override_default_route(route);
    }

    async fn override_default_iso_dep_route(&self, route: RoutingDestination) {
        self.state
            .lock()
            .await
            .options
            .override_default_iso_dep_route(route);
    }

    async fn override_default_offhost_route(&self, route: RoutingDestination) {
        self.state
            .lock()
            .await
            .options
            .override_default_offhost_route(route);
    }

    async fn recover_override(&self) {
        self.state.lock().await.options.recover_override();
    }

    fn supports_prefix_matching(&self) -> bool {
        self.matching_mode().supports_prefix()
    }

    fn supports_subset_matching(&self) -> bool {
        self.matching_mode().supports_subset()
    }
}
