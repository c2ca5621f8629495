//! # NFC Runtime Library
//!
//! Wires the card emulation components into one running stack. The binary
//! in `main.rs` loads configuration and drives a [`CardEmulationRuntime`];
//! the library is exposed for tests.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and component construction
//! - `adapters/` - Port implementations (controller, registry, services, device, bus)
//! - `wiring/` - Routing maintenance and the diagnostics log
//!
//! ## Tasks
//!
//! | Task | Stops on |
//! |------|----------|
//! | Session driver (ce-03) | shutdown signal or all handles dropped |
//! | Routing maintenance | shutdown signal or all senders dropped |
//! | Diagnostics log | shutdown signal |
//!
//! ## Startup Sequence
//!
//! 1. Build the stack (resolver seeded from the registry, NFC on)
//! 2. Program the initial routing table
//! 3. Spawn the session driver, maintenance loop and diagnostics log

pub mod adapters;
pub mod container;
pub mod wiring;

use std::sync::Arc;

use anyhow::Result;
use ce_03_host_emulation::{HostEmulationApi, SessionHandle};
use shared_bus::EventFilter;
use shared_types::{PollingFrame, PollingFrameType};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::container::{CardEmulationStack, StackConfig};
use crate::wiring::{run_diagnostics_log, MaintenanceCoordinator, MaintenanceEvent};

/// Depth of the maintenance queue.
const MAINTENANCE_QUEUE_DEPTH: usize = 64;

/// The running card emulation stack.
pub struct CardEmulationRuntime {
    stack: Arc<CardEmulationStack>,
    maintenance_tx: mpsc::Sender<MaintenanceEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CardEmulationRuntime {
    /// Build the stack, program the initial table and spawn every task.
    pub async fn start(config: StackConfig) -> Result<Self> {
        info!("===========================================");
        info!("  NFC Card Emulation Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let (stack, driver) = CardEmulationStack::build(config);
        let stack = Arc::new(stack);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (maintenance_tx, maintenance_rx) = mpsc::channel(MAINTENANCE_QUEUE_DEPTH);

        let diagnostics = stack.bus.subscribe(EventFilter::all());
        let mut coordinator = MaintenanceCoordinator::new(&stack);
        coordinator.apply(MaintenanceEvent::NfcEnabled).await;

        let mut tasks = Vec::new();

        let mut session_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = driver.run() => {}
                _ = session_shutdown.changed() => {
                    info!("[ce-03] Shutdown signal received");
                }
            }
        }));

        let mut maintenance_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = coordinator.run(maintenance_rx) => {}
                _ = maintenance_shutdown.changed() => {
                    info!("[maintenance] Shutdown signal received");
                }
            }
        }));

        let mut log_shutdown = shutdown_rx;
        tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = run_diagnostics_log(diagnostics) => {}
                _ = log_shutdown.changed() => {}
            }
        }));

        info!(
            routes = stack.controller.committed_routes().len(),
            "Card emulation runtime started"
        );

        Ok(Self {
            stack,
            maintenance_tx,
            shutdown_tx,
            tasks,
        })
    }

    pub fn stack(&self) -> Arc<CardEmulationStack> {
        Arc::clone(&self.stack)
    }

    /// Enqueue side of the session, for radio events.
    pub fn session(&self) -> SessionHandle {
        self.stack.session.clone()
    }

    /// Queue a maintenance event.
    pub async fn notify(&self, event: MaintenanceEvent) -> Result<()> {
        self.maintenance_tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("maintenance loop stopped"))
    }

    /// Hand a command APDU to the session as the radio would.
    pub fn deliver_apdu(&self, apdu: Vec<u8>) -> Result<()> {
        self.stack.controller.mark_data_delivered();
        self.stack.session.on_host_emulation_data(apdu)?;
        Ok(())
    }

    /// Simulate one reader tap: field on, polling frames, activation, the
    /// given command APDUs, deactivation and field off.
    pub fn simulate_tap(&self, apdus: &[Vec<u8>]) -> Result<()> {
        let session = &self.stack.session;
        session.on_field_change_detected(true)?;
        session.on_polling_loop_detected(vec![
            PollingFrame::new(PollingFrameType::On, Vec::new()),
            PollingFrame::new(PollingFrameType::A, vec![0x52]),
        ])?;
        session.on_host_emulation_activated()?;
        for apdu in apdus {
            self.deliver_apdu(apdu.clone())?;
        }
        session.on_host_emulation_deactivated()?;
        session.on_field_change_detected(false)?;
        Ok(())
    }

    /// Signal every task to stop and wait for them.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Detach the loopback binder from the session
    /// 2. Signal shutdown to all tasks
    /// 3. Join them
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        self.stack.binder.detach();

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Runtime task failed: {}", e);
            }
        }
        info!("Shutdown complete");
    }
}
