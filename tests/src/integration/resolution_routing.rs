//! # Resolution → Routing Integration
//!
//! Tests that the routing assignments produced by the resolution engine
//! (ce-01) reach the controller through the routing synthesizer (ce-02)
//! as the minimal set of route/unroute calls.
//!
//! ## Flow Tested:
//!
//! ```text
//! StaticRegistry → Resolution (1) → routing_assignments() → Routing (2) → SimulatedController
//!                                                                │
//!                                                                └→ Event Bus
//! ```

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use ce_01_aid_resolution::{AidResolution, AidResolutionApi};
    use ce_02_aid_routing::domain::table::CATCH_ALL_KEY;
    use ce_02_aid_routing::{
        AidRoutingApi, AidRoutingService, RoutingController, RoutingDestination, RoutingResult,
    };
    use nfc_runtime::adapters::{BusDiagnostics, ControllerCapabilities, SimulatedController};
    use proptest::prelude::*;
    use shared_bus::{CardEmulationEvent, EventFilter, InMemoryEventBus};
    use shared_types::{Category, PowerState};

    use crate::integration::fixtures::*;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Counts every call that changes controller state.
    struct CountingController {
        inner: SimulatedController,
        calls: AtomicUsize,
    }

    impl CountingController {
        fn new(capacity_bytes: usize) -> Self {
            Self {
                inner: SimulatedController::new(ControllerCapabilities {
                    capacity_bytes,
                    nci_version: 0x20,
                    prefix_matching: true,
                    subset_matching: false,
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RoutingController for CountingController {
        async fn route_aid(
            &self,
            aid: &str,
            route: RoutingDestination,
            aid_type: u8,
            power_state: PowerState,
        ) -> RoutingResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.route_aid(aid, route, aid_type, power_state).await
        }

        async fn unroute_aid(&self, aid: &str) -> RoutingResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.unroute_aid(aid).await
        }

        async fn commit_routing(&self) -> RoutingResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.commit_routing().await
        }

        fn supports_prefix_matching(&self) -> bool {
            self.inner.supports_prefix_matching()
        }

        fn supports_subset_matching(&self) -> bool {
            self.inner.supports_subset_matching()
        }

        fn protocol_version(&self) -> u8 {
            self.inner.protocol_version()
        }

        fn remaining_table_capacity(&self) -> usize {
            self.inner.remaining_table_capacity()
        }
    }

    fn counting_routing(
        capacity_bytes: usize,
    ) -> (
        AidRoutingService<CountingController, BusDiagnostics>,
        Arc<CountingController>,
    ) {
        let config = stack_config(Vec::new());
        let controller = Arc::new(CountingController::new(capacity_bytes));
        let diagnostics = Arc::new(BusDiagnostics::new(Arc::new(InMemoryEventBus::new())));
        let routing =
            AidRoutingService::new(config.routing_config(), controller.clone(), diagnostics);
        (routing, controller)
    }

    // =============================================================================
    // PROGRAMMING
    // =============================================================================

    #[tokio::test]
    async fn test_host_and_off_host_services_programmed() {
        let mut config = stack_config(vec![
            host_service("com.shop", LOYALTY_AID, Category::Other),
            off_host_service("com.transit", "SIM1", TRANSIT_AID, Category::Other),
        ]);
        config.routing.uicc = vec![0x81];
        let (stack, _driver) = build_stack(config);

        let assignments = stack.resolver.routing_assignments();
        assert_eq!(assignments.len(), 2);
        assert!(stack.routing.configure_routing(&assignments, false).await);

        let routes = stack.controller.committed_routes();
        assert_eq!(routes[LOYALTY_AID].route, RoutingDestination::HOST);
        assert_eq!(routes[TRANSIT_AID].route, RoutingDestination(0x81));
        assert_eq!(routes[CATCH_ALL_KEY].route, RoutingDestination(ESE_ROUTE));
        assert_eq!(routes.len(), 3);
        assert_eq!(stack.controller.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_default_route_rows_left_to_controller() {
        let (stack, _driver) = build_stack(stack_config(vec![off_host_service(
            "com.transit",
            "eSE1",
            TRANSIT_AID,
            Category::Other,
        )]));

        let assignments = stack.resolver.routing_assignments();
        assert!(stack.routing.configure_routing(&assignments, false).await);

        let routes = stack.controller.committed_routes();
        assert!(!routes.contains_key(TRANSIT_AID));
        assert!(routes.contains_key(CATCH_ALL_KEY));
    }

    #[tokio::test]
    async fn test_prefix_registration_routed_natively() {
        let (stack, _driver) = build_stack(stack_config(vec![host_service(
            "com.bank",
            "A000000003*",
            Category::Other,
        )]));

        assert!(stack
            .resolver
            .resolve("A0000000031234")
            .default_service()
            .is_some());

        let assignments = stack.resolver.routing_assignments();
        assert!(stack.routing.configure_routing(&assignments, false).await);

        let table = stack.routing.committed_table().await;
        let row = table.get("A000000003*").expect("prefix row");
        assert_eq!(row.aid, "A000000003");
        assert!(stack.controller.committed_routes().contains_key("A000000003"));
    }

    // =============================================================================
    // IDEMPOTENCE AND DIFFING
    // =============================================================================

    #[tokio::test]
    async fn test_configure_twice_is_idempotent() {
        let (stack, _driver) = build_stack(stack_config(vec![
            host_service("com.shop", LOYALTY_AID, Category::Other),
            host_service("com.transit", TRANSIT_AID, Category::Other),
        ]));
        let (routing, controller) = counting_routing(256);
        let assignments = stack.resolver.routing_assignments();

        assert!(routing.configure_routing(&assignments, false).await);
        let after_first = controller.calls();
        assert!(after_first > 0);
        assert_eq!(controller.inner.commit_count(), 1);

        assert!(!routing.configure_routing(&assignments, false).await);
        assert_eq!(controller.calls(), after_first);
        assert_eq!(controller.inner.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_force_reprograms_unchanged_table() {
        let (stack, _driver) = build_stack(stack_config(vec![host_service(
            "com.shop",
            LOYALTY_AID,
            Category::Other,
        )]));
        let (routing, controller) = counting_routing(256);
        let assignments = stack.resolver.routing_assignments();

        assert!(routing.configure_routing(&assignments, false).await);
        controller.inner.clear_table();
        routing.on_routing_table_cleared_by_controller().await;

        assert!(routing.configure_routing(&assignments, true).await);
        assert_eq!(controller.inner.commit_count(), 2);
        assert!(controller.inner.committed_routes().contains_key(LOYALTY_AID));
    }

    #[tokio::test]
    async fn test_uninstall_unroutes_stale_row() {
        let (stack, _driver) = build_stack(stack_config(vec![
            host_service("com.shop", LOYALTY_AID, Category::Other),
            host_service("com.transit", TRANSIT_AID, Category::Other),
        ]));
        assert!(
            stack
                .routing
                .configure_routing(&stack.resolver.routing_assignments(), false)
                .await
        );

        assert!(stack.registry.uninstall(0, &component("com.shop")));
        stack.resolver.refresh_services(0);
        assert!(stack.resolver.resolve(LOYALTY_AID).is_none());
        assert!(
            stack
                .routing
                .configure_routing(&stack.resolver.routing_assignments(), false)
                .await
        );

        let routes = stack.controller.committed_routes();
        assert!(!routes.contains_key(LOYALTY_AID));
        assert!(routes.contains_key(TRANSIT_AID));
        assert!(stack.routing.committed_table().await.get(LOYALTY_AID).is_none());
    }

    // =============================================================================
    // CAPACITY AND FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_overflow_keeps_previous_table() {
        let mut config = stack_config(vec![host_service("com.shop", LOYALTY_AID, Category::Other)]);
        config.controller.capacity_bytes = 40;
        config.controller.nci_version = 0x10;
        config.routing.auto_change_enabled = false;
        let (stack, _driver) = build_stack(config);
        let mut bus = stack.bus.subscribe(EventFilter::all());

        assert!(
            stack
                .routing
                .configure_routing(&stack.resolver.routing_assignments(), false)
                .await
        );
        let before = stack.controller.committed_routes();
        let table_before = stack.routing.committed_table().await;

        for (i, aid) in ["F0000000000001", "F0000000000002", "F0000000000003", "F0000000000004"]
            .into_iter()
            .enumerate()
        {
            stack
                .registry
                .install(host_service(&format!("com.extra{i}"), aid, Category::Other));
        }
        stack.resolver.refresh_services(0);

        assert!(
            stack
                .routing
                .configure_routing(&stack.resolver.routing_assignments(), false)
                .await
        );
        assert_eq!(stack.controller.committed_routes(), before);
        assert_eq!(stack.routing.committed_table().await, table_before);
        assert_eq!(stack.controller.commit_count(), 1);
        assert!(drain_bus(&mut bus).iter().any(|e| matches!(
            e,
            CardEmulationEvent::RoutingOverflow { capacity_bytes: 40, .. }
        )));
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_table_and_recovers() {
        let (stack, _driver) = build_stack(stack_config(vec![host_service(
            "com.shop",
            LOYALTY_AID,
            Category::Other,
        )]));
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let assignments = stack.resolver.routing_assignments();

        stack.controller.set_fail_commits(true);
        assert!(stack.routing.configure_routing(&assignments, false).await);
        assert!(stack.routing.committed_table().await.is_empty());
        assert!(drain_bus(&mut bus)
            .iter()
            .any(|e| matches!(e, CardEmulationEvent::RoutingCommitFailed { .. })));

        stack.controller.set_fail_commits(false);
        assert!(stack.routing.configure_routing(&assignments, false).await);
        assert!(stack.controller.committed_routes().contains_key(LOYALTY_AID));
    }

    // =============================================================================
    // RESOLUTION RULES
    // =============================================================================

    #[tokio::test]
    async fn test_wallet_role_holder_wins_payment_aid() {
        let mut config = stack_config(vec![
            host_service("com.bank.a", PAY_AID, Category::Payment),
            host_service("com.bank.b", PAY_AID, Category::Payment),
        ]);
        config.wallet_role_holder = Some("com.bank.a".into());
        let (stack, _driver) = build_stack(config);

        let default_of = |resolution: AidResolution| {
            resolution
                .default_service()
                .map(|s| s.component.clone())
        };
        assert_eq!(
            default_of(stack.resolver.resolve(PAY_AID)),
            Some(component("com.bank.a"))
        );

        stack
            .resolver
            .on_wallet_role_holder_changed(Some("com.bank.b".into()), 0);
        assert_eq!(
            default_of(stack.resolver.resolve(PAY_AID)),
            Some(component("com.bank.b"))
        );
    }

    #[tokio::test]
    async fn test_other_category_tie_is_ambiguous() {
        let (stack, _driver) = build_stack(stack_config(vec![
            host_service("com.shop.one", LOYALTY_AID, Category::Other),
            host_service("com.shop.two", LOYALTY_AID, Category::Other),
        ]));

        let resolution = stack.resolver.resolve(LOYALTY_AID);
        assert!(resolution.is_ambiguous());
        assert_eq!(resolution.services().len(), 2);
        assert!(stack.resolver.resolve("A0000000999999").is_none());
    }

    // =============================================================================
    // PROPERTIES
    // =============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Every host AID gets one row plus the catch-all, and a second
        /// configure with the same input touches nothing.
        #[test]
        fn prop_configure_is_idempotent(aids in prop::collection::btree_set("F0[0-9A-F]{12}", 1..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let aids: BTreeSet<String> = aids;
                let services = aids
                    .iter()
                    .enumerate()
                    .map(|(i, aid)| host_service(&format!("com.svc{i}"), aid, Category::Other))
                    .collect();
                let (stack, _driver) = build_stack(stack_config(services));
                let (routing, controller) = counting_routing(4096);
                let assignments = stack.resolver.routing_assignments();

                assert!(routing.configure_routing(&assignments, false).await);
                let calls = controller.calls();
                let routes = controller.inner.committed_routes();
                assert_eq!(routes.len(), aids.len() + 1);
                for aid in &aids {
                    assert_eq!(routes[aid.as_str()].route, RoutingDestination::HOST);
                }

                assert!(!routing.configure_routing(&assignments, false).await);
                assert_eq!(controller.calls(), calls);
            });
        }
    }
}
