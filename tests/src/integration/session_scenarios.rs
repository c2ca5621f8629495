//! # Reader Tap Scenarios
//!
//! Drives the emulation session (ce-03) the way the controller would, over
//! the runtime's loopback services, simulated controller and event bus.
//!
//! ## Flows Tested:
//!
//! 1. **Single default**: SELECT binds the service and reaches XFER; the
//!    APDU is forwarded exactly once and the reply reaches the reader
//! 2. **Tied candidates**: the user is asked to choose; no AID_NOT_FOUND
//! 3. **Field loss**: field off in XFER returns to IDLE after the idle
//!    delay unless the reader comes back first
//! 4. **Outcomes**: deactivation before the bind or before the first reply
//!    is classified on the bus
//! 5. **Bind lifecycle**: a late completion from an earlier tap leaves the
//!    current bind alone; a bind that cannot start is answered with
//!    AID_NOT_FOUND

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ce_03_host_emulation::domain::apdu::AID_NOT_FOUND;
    use ce_03_host_emulation::{select_apdu, BindingKind, EmulationState, HostEmulationApi};
    use nfc_runtime::adapters::{PromptRecord, DEFAULT_RESPONSE};
    use shared_bus::{CardEmulationEvent, DeactivationOutcome, EventFilter};
    use shared_types::{Category, DeactivationReason};

    use crate::integration::fixtures::*;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const GET_PROCESSING_OPTIONS: [u8; 5] = [0x80, 0xA8, 0x00, 0x00, 0x00];

    fn select(aid: &str) -> Vec<u8> {
        select_apdu(aid).unwrap()
    }

    // =============================================================================
    // SINGLE DEFAULT SERVICE
    // =============================================================================

    #[tokio::test]
    async fn test_single_default_service_reaches_transfer() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let session = stack.session.clone();

        session.on_field_change_detected(true).unwrap();
        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        settle(&mut driver).await;

        assert_eq!(driver.session().state(), EmulationState::Xfer);
        assert_eq!(session.state(), EmulationState::Xfer);
        let channel = stack
            .binder
            .channel(&component("com.transit"), BindingKind::Session)
            .expect("session binding");
        assert_eq!(channel.commands(), vec![select(TRANSIT_AID)]);
        assert_eq!(stack.binder.bind_count(), 1);
        assert_eq!(stack.controller.take_responses(), vec![DEFAULT_RESPONSE.to_vec()]);

        session
            .on_host_emulation_data(GET_PROCESSING_OPTIONS.to_vec())
            .unwrap();
        settle(&mut driver).await;
        assert_eq!(channel.commands().len(), 2);
        assert_eq!(stack.binder.bind_count(), 1);

        session.on_host_emulation_deactivated().unwrap();
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Idle);
        assert_eq!(channel.deactivations(), vec![DeactivationReason::LinkLoss]);
        assert!(!stack
            .binder
            .is_bound(&component("com.transit"), BindingKind::Session));
        assert_eq!(
            outcomes(&drain_bus(&mut bus)),
            vec![DeactivationOutcome::Succeeded]
        );
    }

    #[tokio::test]
    async fn test_bound_payment_service_answers_without_new_bind() {
        let mut config = stack_config(vec![host_service("com.bank", PAY_AID, Category::Payment)]);
        config.wallet_role_holder = Some("com.bank".into());
        let (stack, mut driver) = build_stack(config);
        let session = stack.session.clone();

        session
            .on_preferred_payment_service_changed(0, Some(component("com.bank")))
            .unwrap();
        settle(&mut driver).await;
        assert_eq!(
            driver.session().bound_payment_service(),
            Some(&component("com.bank"))
        );

        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(PAY_AID)).unwrap();
        settle(&mut driver).await;

        assert_eq!(driver.session().state(), EmulationState::Xfer);
        assert_eq!(stack.binder.bind_count(), 1);
        let channel = stack
            .binder
            .channel(&component("com.bank"), BindingKind::Payment)
            .expect("payment binding");
        assert_eq!(channel.commands(), vec![select(PAY_AID)]);
        assert_eq!(stack.controller.take_responses(), vec![DEFAULT_RESPONSE.to_vec()]);
    }

    // =============================================================================
    // TIED CANDIDATES
    // =============================================================================

    #[tokio::test]
    async fn test_tied_candidates_ask_the_user() {
        let (stack, mut driver) = build_stack(stack_config(vec![
            host_service("com.shop.one", LOYALTY_AID, Category::Other),
            host_service("com.shop.two", LOYALTY_AID, Category::Other),
        ]));
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let session = stack.session.clone();

        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(LOYALTY_AID)).unwrap();
        settle(&mut driver).await;

        assert_eq!(driver.session().state(), EmulationState::WaitForDeactivate);
        let responses = stack.controller.take_responses();
        assert!(!responses.contains(&AID_NOT_FOUND.to_vec()));
        assert!(responses.is_empty());
        assert_eq!(stack.binder.bind_count(), 0);

        let choosers: Vec<_> = stack
            .prompts
            .history()
            .into_iter()
            .filter_map(|p| match p {
                PromptRecord::Chooser { candidates, .. } => Some(candidates),
                _ => None,
            })
            .collect();
        assert_eq!(choosers.len(), 1);
        assert_eq!(choosers[0].len(), 2);
        assert!(choosers[0].contains(&component("com.shop.one")));
        assert!(choosers[0].contains(&component("com.shop.two")));

        let events = drain_bus(&mut bus);
        assert!(events.iter().any(|e| matches!(
            e,
            CardEmulationEvent::AidConflict { aid, candidates, .. }
                if aid == LOYALTY_AID && candidates.len() == 2
        )));

        // The reader retries; nothing happens until it leaves
        session.on_host_emulation_data(select(LOYALTY_AID)).unwrap();
        settle(&mut driver).await;
        assert!(stack.controller.take_responses().is_empty());

        session.on_host_emulation_deactivated().unwrap();
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Idle);
        assert!(outcomes(&drain_bus(&mut bus)).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_aid_not_found() {
        let (stack, mut driver) = build_stack(stack_config(Vec::new()));
        let session = stack.session.clone();

        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select("A0000000999999")).unwrap();
        settle(&mut driver).await;

        assert_eq!(stack.controller.take_responses(), vec![AID_NOT_FOUND.to_vec()]);
        assert_eq!(driver.session().state(), EmulationState::WaitForSelect);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unroutable_aids_reported_after_delay() {
        let (stack, mut driver) = build_stack(stack_config(Vec::new()));
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let session = stack.session.clone();

        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select("A0000000999999")).unwrap();
        session.on_host_emulation_data(select("A0000000888888")).unwrap();
        settle(&mut driver).await;
        assert!(drain_bus(&mut bus).is_empty());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        settle(&mut driver).await;
        let reports: Vec<_> = drain_bus(&mut bus)
            .into_iter()
            .filter_map(|e| match e {
                CardEmulationEvent::UnroutableAids { aids } => Some(aids),
                _ => None,
            })
            .collect();
        assert_eq!(
            reports,
            vec![vec!["A0000000999999".to_string(), "A0000000888888".to_string()]]
        );
    }

    // =============================================================================
    // FIELD LOSS
    // =============================================================================

    /// Activate and complete one SELECT so the session sits in XFER.
    async fn enter_transfer(
        driver: &mut ce_03_host_emulation::SessionDriver,
        session: &ce_03_host_emulation::SessionHandle,
    ) {
        session.on_field_change_detected(true).unwrap();
        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        settle(driver).await;
        assert_eq!(driver.session().state(), EmulationState::Xfer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_off_in_transfer_returns_to_idle() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let session = stack.session.clone();
        enter_transfer(&mut driver, &session).await;

        session.on_field_change_detected(false).unwrap();
        settle(&mut driver).await;
        tokio::time::sleep(Duration::from_millis(4900)).await;
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Xfer);

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Idle);
        assert!(driver.session().active_service().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_after_field_off_cancels_idle_timer() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let session = stack.session.clone();
        enter_transfer(&mut driver, &session).await;

        session.on_field_change_detected(false).unwrap();
        settle(&mut driver).await;
        tokio::time::sleep(Duration::from_millis(3000)).await;
        session
            .on_host_emulation_data(GET_PROCESSING_OPTIONS.to_vec())
            .unwrap();
        settle(&mut driver).await;

        tokio::time::sleep(Duration::from_millis(6000)).await;
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Xfer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_back_on_cancels_idle_timer() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let session = stack.session.clone();
        enter_transfer(&mut driver, &session).await;

        session.on_field_change_detected(false).unwrap();
        session.on_field_change_detected(true).unwrap();
        settle(&mut driver).await;

        tokio::time::sleep(Duration::from_millis(6000)).await;
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Xfer);
    }

    // =============================================================================
    // DEACTIVATION OUTCOMES
    // =============================================================================

    #[tokio::test]
    async fn test_deactivation_before_first_response() {
        let mut config = stack_config(vec![host_service("com.bank", PAY_AID, Category::Payment)]);
        config.wallet_role_holder = Some("com.bank".into());
        let (stack, mut driver) = build_stack(config);
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let session = stack.session.clone();

        session
            .on_preferred_payment_service_changed(0, Some(component("com.bank")))
            .unwrap();
        settle(&mut driver).await;

        // The loopback reply is queued behind the deactivation
        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(PAY_AID)).unwrap();
        session.on_host_emulation_deactivated().unwrap();
        settle(&mut driver).await;

        assert_eq!(
            outcomes(&drain_bus(&mut bus)),
            vec![DeactivationOutcome::DisconnectedBeforeFirstResponse]
        );
        assert!(stack.controller.take_responses().is_empty());
        assert_eq!(driver.session().state(), EmulationState::Idle);
    }

    #[tokio::test]
    async fn test_deactivation_before_bound() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let session = stack.session.clone();

        // The loopback bind completion is queued behind the deactivation
        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        session.on_host_emulation_deactivated().unwrap();
        settle(&mut driver).await;

        assert_eq!(
            outcomes(&drain_bus(&mut bus)),
            vec![DeactivationOutcome::DisconnectedBeforeBound]
        );
        assert!(driver.session().bound_service().is_none());
        assert!(!stack
            .binder
            .is_bound(&component("com.transit"), BindingKind::Session));
        assert!(stack.controller.take_responses().is_empty());
    }

    // =============================================================================
    // BIND LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_late_completion_from_previous_tap_keeps_current_bind() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let mut bus = stack.bus.subscribe(EventFilter::all());
        let session = stack.session.clone();

        // Both bind completions land after the second SELECT
        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        session.on_host_emulation_deactivated().unwrap();
        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        settle(&mut driver).await;

        assert_eq!(driver.session().state(), EmulationState::Xfer);
        assert_eq!(stack.binder.bind_count(), 2);
        assert_eq!(
            stack
                .binder
                .connection_count(&component("com.transit"), BindingKind::Session),
            1
        );
        let channel = stack
            .binder
            .channel(&component("com.transit"), BindingKind::Session)
            .expect("current session binding");
        assert_eq!(channel.commands(), vec![select(TRANSIT_AID)]);
        assert_eq!(stack.controller.take_responses(), vec![DEFAULT_RESPONSE.to_vec()]);
        assert_eq!(
            outcomes(&drain_bus(&mut bus)),
            vec![DeactivationOutcome::DisconnectedBeforeBound]
        );
    }

    #[tokio::test]
    async fn test_refused_bind_answers_not_found() {
        let (stack, mut driver) = build_stack(stack_config(vec![host_service(
            "com.transit",
            TRANSIT_AID,
            Category::Other,
        )]));
        let session = stack.session.clone();
        stack.binder.refuse(component("com.transit"));

        session.on_host_emulation_activated().unwrap();
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        settle(&mut driver).await;

        assert_eq!(driver.session().state(), EmulationState::WaitForSelect);
        assert_eq!(stack.controller.take_responses(), vec![AID_NOT_FOUND.to_vec()]);
        assert_eq!(stack.binder.bind_count(), 0);

        stack.binder.allow(&component("com.transit"));
        session.on_host_emulation_data(select(TRANSIT_AID)).unwrap();
        settle(&mut driver).await;
        assert_eq!(driver.session().state(), EmulationState::Xfer);
        assert_eq!(stack.controller.take_responses(), vec![DEFAULT_RESPONSE.to_vec()]);
    }
}
