//! # Card Emulation Stack
//!
//! Holds the component instances and the adapters wired into them.
//!
//! ## Initialization Order
//!
//! ```text
//! 1. Event bus, registry, controller, device, prompts, binder
//! 2. Resolution engine (registry)
//! 3. Routing synthesizer (controller, bus diagnostics)
//! 4. Emulation session (resolver, controller, binder, prompts, device, bus)
//! 5. Seed: refresh services, wallet role, NFC on
//! ```
//!
//! The session driver is handed back separately; the runtime spawns it.

use std::sync::Arc;

use ce_01_aid_resolution::{AidResolutionApi, AidResolutionService};
use ce_02_aid_routing::AidRoutingService;
use ce_03_host_emulation::{SessionDriver, SessionHandle, SessionPorts};
use shared_bus::InMemoryEventBus;
use tracing::info;

use crate::adapters::{
    BusDiagnostics, ControllerCapabilities, LoggingPrompts, LoopbackBinder, SimulatedController,
    StaticDeviceState, StaticRegistry,
};
use crate::container::config::StackConfig;

/// Resolution engine over the static registry.
pub type ResolutionEngine = AidResolutionService<StaticRegistry>;

/// Routing synthesizer over the simulated controller.
pub type RoutingSynthesizer = AidRoutingService<SimulatedController, BusDiagnostics>;

/// Every component and adapter of one NFC stack.
pub struct CardEmulationStack {
    pub config: StackConfig,

    // =========================================================================
    // SHARED INFRASTRUCTURE
    // =========================================================================
    pub bus: Arc<InMemoryEventBus>,
    pub diagnostics: Arc<BusDiagnostics>,

    // =========================================================================
    // ADAPTERS
    // =========================================================================
    pub registry: Arc<StaticRegistry>,
    pub controller: Arc<SimulatedController>,
    pub device: Arc<StaticDeviceState>,
    pub prompts: Arc<LoggingPrompts>,
    pub binder: Arc<LoopbackBinder>,

    // =========================================================================
    // COMPONENTS
    // =========================================================================
    /// AID Resolution Engine (ce-01)
    pub resolver: Arc<ResolutionEngine>,
    /// Routing Table Synthesizer (ce-02)
    pub routing: Arc<RoutingSynthesizer>,
    /// Emulation session (ce-03) enqueue side
    pub session: SessionHandle,
}

impl CardEmulationStack {
    /// Build the stack. `config` must already be validated.
    pub fn build(config: StackConfig) -> (Self, SessionDriver) {
        info!("Building card emulation stack");

        let bus = Arc::new(InMemoryEventBus::new());
        let diagnostics = Arc::new(BusDiagnostics::new(Arc::clone(&bus)));
        let registry = Arc::new(StaticRegistry::from_services(config.services.clone()));
        let controller = Arc::new(SimulatedController::new(ControllerCapabilities {
            capacity_bytes: config.controller.capacity_bytes,
            nci_version: config.controller.nci_version,
            prefix_matching: config.controller.prefix_matching,
            subset_matching: config.controller.subset_matching,
        }));
        let device = Arc::new(StaticDeviceState::default());
        let prompts = Arc::new(LoggingPrompts::default());
        let binder = Arc::new(LoopbackBinder::default());

        let resolver = Arc::new(AidResolutionService::new(
            config.resolution_config(),
            Arc::clone(&registry),
        ));
        let routing = Arc::new(AidRoutingService::new(
            config.routing_config(),
            Arc::clone(&controller),
            Arc::clone(&diagnostics),
        ));

        let user = config.resolution.initial_user;
        resolver.refresh_services(user);
        resolver.on_wallet_role_holder_changed(config.wallet_role_holder.clone(), user);
        resolver.on_nfc_enabled();

        let ports = SessionPorts {
            resolver: resolver.clone(),
            radio: controller.clone(),
            binder: binder.clone(),
            prompts: prompts.clone(),
            device: device.clone(),
            diagnostics: diagnostics.clone(),
        };
        let (driver, session) = SessionDriver::new(config.session_config(), ports);
        binder.attach(session.clone());

        info!(
            services = resolver.services().len(),
            wallet = ?resolver.wallet_role_holder(),
            "Card emulation stack built"
        );

        let stack = Self {
            config,
            bus,
            diagnostics,
            registry,
            controller,
            device,
            prompts,
            binder,
            resolver,
            routing,
            session,
        };
        (stack, driver)
    }
}
