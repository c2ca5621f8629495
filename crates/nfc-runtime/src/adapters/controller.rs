//! # Simulated NFC Controller
//!
//! In-process stand-in for the NFCC. Implements the routing-table port of
//! ce-02 and the data-path port of ce-03.
//!
//! ## Routing table
//!
//! `route_aid`/`unroute_aid` stage rows; `commit_routing` copies the staged
//! table into the committed one. Table size uses the synthesizer's per-row
//! cost (AID bytes plus `ROW_OVERHEAD_BYTES`), so both capacity checks agree.

use async_trait::async_trait;
use ce_02_aid_routing::domain::table::ROW_OVERHEAD_BYTES;
use ce_02_aid_routing::{
    RoutingController, RoutingDestination, RoutingError, RoutingResult, NCI_VERSION_2_0,
};
use ce_03_host_emulation::{RadioTransceiver, SessionError, SessionResult};
use nfc_telemetry::{APDU_DISPATCH_DURATION, SESSION_EVENTS_QUEUED};
use parking_lot::Mutex;
use shared_types::PowerState;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One programmed routing-table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgrammedRoute {
    pub route: RoutingDestination,
    pub aid_type: u8,
    pub power_state: PowerState,
}

/// Capability answers the simulated controller gives.
#[derive(Clone, Copy, Debug)]
pub struct ControllerCapabilities {
    pub capacity_bytes: usize,
    pub nci_version: u8,
    pub prefix_matching: bool,
    pub subset_matching: bool,
}

/// In-process controller.
pub struct SimulatedController {
    capabilities: ControllerCapabilities,
    staged: Mutex<BTreeMap<String, ProgrammedRoute>>,
    committed: Mutex<BTreeMap<String, ProgrammedRoute>>,
    commits: AtomicUsize,
    fail_commits: AtomicBool,
    observe_mode: AtomicBool,
    responses: Mutex<Vec<Vec<u8>>>,
    dispatch_started: Mutex<Option<Instant>>,
}

impl SimulatedController {
    pub fn new(capabilities: ControllerCapabilities) -> Self {
        Self {
            capabilities,
            staged: Mutex::new(BTreeMap::new()),
            committed: Mutex::new(BTreeMap::new()),
            commits: AtomicUsize::new(0),
            fail_commits: AtomicBool::new(false),
            observe_mode: AtomicBool::new(false),
            responses: Mutex::new(Vec::new()),
            dispatch_started: Mutex::new(None),
        }
    }

    /// Snapshot of the committed table, keyed by AID text.
    pub fn committed_routes(&self) -> BTreeMap<String, ProgrammedRoute> {
        self.committed.lock().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every following commit fail until reset.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Drop the table as a controller reset would.
    pub fn clear_table(&self) {
        self.staged.lock().clear();
        self.committed.lock().clear();
        info!("Simulated controller cleared its routing table");
    }

    /// Note that a command APDU was just handed to the session.
    pub fn mark_data_delivered(&self) {
        SESSION_EVENTS_QUEUED.inc();
        *self.dispatch_started.lock() = Some(Instant::now());
    }

    /// Response APDUs sent to the reader, oldest first.
    pub fn take_responses(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.responses.lock())
    }

    fn table_size(table: &BTreeMap<String, ProgrammedRoute>) -> usize {
        table
            .keys()
            .map(|aid| aid.trim_end_matches(['*', '#']).len() / 2 + ROW_OVERHEAD_BYTES)
            .sum()
    }
}

#[async_trait]
impl RoutingController for SimulatedController {
    async fn route_aid(
        &self,
        aid: &str,
        route: RoutingDestination,
        aid_type: u8,
        power_state: PowerState,
    ) -> RoutingResult<()> {
        debug!(aid, route = route.0, aid_type, power = power_state.bits(), "Stage route");
        self.staged.lock().insert(
            aid.to_string(),
            ProgrammedRoute {
                route,
                aid_type,
                power_state,
            },
        );
        Ok(())
    }

    async fn unroute_aid(&self, aid: &str) -> RoutingResult<()> {
        debug!(aid, "Stage unroute");
        self.staged.lock().remove(aid);
        Ok(())
    }

    async fn commit_routing(&self) -> RoutingResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            warn!("Simulated controller refusing commit");
            return Err(RoutingError::controller("commit", "controller busy"));
        }
        let staged = self.staged.lock().clone();
        let size = Self::table_size(&staged);
        if size > self.capabilities.capacity_bytes {
            return Err(RoutingError::controller(
                "commit",
                format!("table of {size} bytes exceeds {}", self.capabilities.capacity_bytes),
            ));
        }
        *self.committed.lock() = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_prefix_matching(&self) -> bool {
        self.capabilities.prefix_matching
    }

    fn supports_subset_matching(&self) -> bool {
        self.capabilities.subset_matching
    }

    fn protocol_version(&self) -> u8 {
        self.capabilities.nci_version
    }

    fn remaining_table_capacity(&self) -> usize {
        let used = Self::table_size(&self.committed.lock());
        self.capabilities.capacity_bytes.saturating_sub(used)
    }
}

#[async_trait]
impl RadioTransceiver for SimulatedController {
    async fn send_response(&self, apdu: &[u8]) -> SessionResult<()> {
        if let Some(started) = self.dispatch_started.lock().take() {
            APDU_DISPATCH_DURATION.observe(started.elapsed().as_secs_f64());
        }
        debug!(response = %hex::encode_upper(apdu), "Response to reader");
        self.responses.lock().push(apdu.to_vec());
        Ok(())
    }

    async fn set_observe_mode(&self, enabled: bool) -> SessionResult<()> {
        if enabled && self.capabilities.nci_version < NCI_VERSION_2_0 {
            return Err(SessionError::radio("set_observe_mode", "unsupported by NCI 1.x"));
        }
        self.observe_mode.store(enabled, Ordering::SeqCst);
        info!(enabled, "Observe mode switched");
        Ok(())
    }

    fn is_observe_mode_enabled(&self) -> bool {
        self.observe_mode.load(Ordering::SeqCst)
    }
}
