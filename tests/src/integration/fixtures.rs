//! # Shared Fixtures
//!
//! Services, stacks and bus helpers used by the integration tests and the
//! benchmarks.

use ce_03_host_emulation::SessionDriver;
use nfc_runtime::container::{CardEmulationStack, StackConfig};
use shared_bus::{CardEmulationEvent, DeactivationOutcome, Subscription};
use shared_types::{AidPattern, CardEmulationService, Category, ComponentName};

pub const PAY_AID: &str = "A0000000031010";
pub const LOYALTY_AID: &str = "F0010203040506";
pub const TRANSIT_AID: &str = "F0A1B2C3D4E5";

/// Route id of the first embedded secure element in every fixture stack.
pub const ESE_ROUTE: u8 = 0x86;

pub fn component(pkg: &str) -> ComponentName {
    ComponentName::new(pkg, ".Service")
}

pub fn host_service(pkg: &str, aid: &str, category: Category) -> CardEmulationService {
    let pattern = AidPattern::parse(aid).expect("valid AID");
    CardEmulationService::host(component(pkg), 0).with_aid(pattern, category)
}

pub fn off_host_service(
    pkg: &str,
    secure_element: &str,
    aid: &str,
    category: Category,
) -> CardEmulationService {
    let pattern = AidPattern::parse(aid).expect("valid AID");
    CardEmulationService::off_host(component(pkg), 0, secure_element).with_aid(pattern, category)
}

/// Stack config with one eSE and the default route on it, so host AIDs get
/// explicit rows.
pub fn stack_config(services: Vec<CardEmulationService>) -> StackConfig {
    let mut config = StackConfig {
        services,
        ..StackConfig::default()
    };
    config.routing.ese = vec![ESE_ROUTE];
    config.routing.default_route = ESE_ROUTE;
    config.routing.default_offhost_route = ESE_ROUTE;
    config
}

pub fn build_stack(config: StackConfig) -> (CardEmulationStack, SessionDriver) {
    CardEmulationStack::build(config)
}

/// Let spawned timers run, then handle everything the session has queued.
pub async fn settle(driver: &mut SessionDriver) {
    loop {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        if driver.drain().await == 0 {
            break;
        }
    }
}

/// Everything published so far.
pub fn drain_bus(subscription: &mut Subscription) -> Vec<CardEmulationEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = subscription.try_recv() {
        events.push(event);
    }
    events
}

pub fn outcomes(events: &[CardEmulationEvent]) -> Vec<DeactivationOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            CardEmulationEvent::SessionDeactivated { outcome, .. } => Some(*outcome),
            _ => None,
        })
        .collect()
}
