//! Emulation Session - event handling
//!
//! [`HostEmulationSession`] owns all session state and handles one
//! [`SessionEvent`] at a time. Nothing here returns an error: adapter
//! failures are logged and answered with a protocol-level reply where the
//! reader is waiting for one.
//!
//! ## SELECT dispatch
//!
//! ```text
//! SELECT ──→ platform AID? ──yes──→ canned reply
//!               │ no
//!               ↓
//!            resolve ──none──→ 6A82 (+ unroutable report)
//!               │
//!       ┌───────┴────────┐
//!    default          no default
//!       │                │
//!   policy gates    active service among candidates?
//!    │      │          │ yes          │ no
//!  fail    pass        │              ↓
//!    │      └────→ bind / forward   chooser, W4_DEACTIVATE
//!    ↓
//!  6A82 (+ unlock prompt)
//! ```

use crate::domain::apdu::{
    AID_NOT_FOUND, PLATFORM_HCE_AID, PLATFORM_HCE_RESPONSE, UNKNOWN_ERROR,
};
use crate::domain::{
    break_tie, find_select_aid, is_ndef_aid, should_deliver_pending, CycleTracker, EmulationState,
    PollingFilterIndex, PollingLoopState, TieBreakContext,
};
use crate::events::{SessionEvent, TimerKind};
use crate::metrics;
use crate::ports::outbound::{
    BindRequest, BindingKind, DeviceState, DiagnosticsSink, RadioTransceiver, ServiceBinder,
    ServiceChannel, UserPrompts,
};
use crate::state::{ActiveService, BoundService, SessionState};
use ce_01_aid_resolution::AidResolutionApi;
use shared_bus::{CardEmulationEvent, PolicyViolationKind};
use shared_types::{
    CardEmulationService, Category, ComponentName, DeactivationReason, PollingFrame,
    PollingFrameType, UserId,
};
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Session configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Field-off grace period before returning to IDLE
    pub idle_delay: Duration,
    /// Delay before observe mode is turned back on after a transaction
    pub observe_reenable_delay: Duration,
    /// Delay before observe mode is lifted for unattended polling frames
    pub auto_disable_observe_delay: Duration,
    /// Window over which unroutable AIDs are collected into one report
    pub unroutable_report_delay: Duration,
    /// Lift observe mode when delivered frames find no foreground app
    pub auto_disable_observe_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(5000),
            observe_reenable_delay: Duration::from_millis(2000),
            auto_disable_observe_delay: Duration::from_millis(3000),
            unroutable_report_delay: Duration::from_millis(1000),
            auto_disable_observe_mode: true,
        }
    }
}

/// Collaborators the session drives.
#[derive(Clone)]
pub struct SessionPorts {
    pub resolver: Arc<dyn AidResolutionApi>,
    pub radio: Arc<dyn RadioTransceiver>,
    pub binder: Arc<dyn ServiceBinder>,
    pub prompts: Arc<dyn UserPrompts>,
    pub device: Arc<dyn DeviceState>,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}

/// Emulation Session State Machine
pub struct HostEmulationSession {
    config: SessionConfig,
    ports: SessionPorts,
    state: SessionState,
    /// Timers enqueue their firings here
    queue: mpsc::WeakUnboundedSender<SessionEvent>,
    state_tx: watch::Sender<EmulationState>,
}

impl HostEmulationSession {
    pub(crate) fn new(
        config: SessionConfig,
        ports: SessionPorts,
        queue: mpsc::WeakUnboundedSender<SessionEvent>,
        state_tx: watch::Sender<EmulationState>,
    ) -> Self {
        let mut state = SessionState::new();
        state.filters = PollingFilterIndex::build(&ports.resolver.polling_loop_filters());
        Self {
            config,
            ports,
            state,
            queue,
            state_tx,
        }
    }

    pub fn state(&self) -> EmulationState {
        self.state.state
    }

    pub fn polling_state(&self) -> PollingLoopState {
        self.state.polling_state
    }

    /// Service currently receiving APDUs or frames.
    pub fn active_service(&self) -> Option<&ComponentName> {
        self.state.active.as_ref().map(|a| &a.service.component)
    }

    /// Session-scoped service with an established channel.
    pub fn bound_service(&self) -> Option<&ComponentName> {
        self.state
            .session_binding
            .bound
            .as_ref()
            .map(|b| &b.component)
    }

    pub fn bound_payment_service(&self) -> Option<&ComponentName> {
        self.state.payment.bound.as_ref().map(|b| &b.component)
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: SessionEvent) {
        debug!(event = event.label(), state = %self.state.state, "Handling session event");
        match event {
            SessionEvent::FieldChanged { on } => self.on_field_changed(on),
            SessionEvent::Activated => self.on_activated(),
            SessionEvent::Data { apdu } => self.on_data(apdu).await,
            SessionEvent::Deactivated => self.on_deactivated().await,
            SessionEvent::OffHostAidSelected => self.on_off_host_selected().await,
            SessionEvent::PollingLoop { frames } => self.on_polling_loop(frames).await,
            SessionEvent::ObserveModeChanged { enabled } => self.on_observe_mode_changed(enabled),
            SessionEvent::ServiceResponse { from, apdu } => self.on_service_response(from, apdu).await,
            SessionEvent::ServiceUnhandled { from } => self.on_service_unhandled(from),
            SessionEvent::ServiceBound {
                component,
                user,
                kind,
                epoch,
                channel,
            } => {
                self.on_service_bound(component, user, kind, epoch, channel)
                    .await
            }
            SessionEvent::ServiceDisconnected { component, kind } => {
                self.on_service_disconnected(&component, kind)
            }
            SessionEvent::BindingDied { component, kind } => {
                self.on_binding_died(&component, kind).await
            }
            SessionEvent::PreferredPaymentChanged { user, component } => {
                self.on_preferred_payment_changed(user, component).await
            }
            SessionEvent::PreferredForegroundChanged { user, component } => {
                self.on_preferred_foreground_changed(user, component).await
            }
            SessionEvent::PollingFiltersChanged => {
                self.state.filters =
                    PollingFilterIndex::build(&self.ports.resolver.polling_loop_filters());
            }
            SessionEvent::Timer { kind, token } => self.on_timer(kind, token).await,
        }
        metrics::set_state(self.state.state.code());
        self.state_tx.send_replace(self.state.state);
    }

    /// Abort every armed timer.
    pub(crate) fn shutdown(&mut self) {
        self.state.timers.cancel_all();
    }

    // =========================================================================
    // RADIO EVENTS
    // =========================================================================

    fn on_field_changed(&mut self, on: bool) {
        self.cancel(TimerKind::ReturnToIdle);
        if on {
            return;
        }
        self.schedule(TimerKind::ReturnToIdle, self.config.idle_delay);
        let observe = &self.state.observe;
        if observe.reenable_on_field_off && observe.reenable_after_transaction {
            debug!("Field off detected, will re-enable observe mode");
            self.schedule(TimerKind::ReenableObserveMode, self.config.observe_reenable_delay);
        }
    }

    fn on_activated(&mut self) {
        self.cancel(TimerKind::ReturnToIdle);
        self.ports.prompts.dismiss_tap_again();
        if self.state.state.is_activated() {
            error!(state = %self.state.state, "Got activation event in non-idle state");
        }
        self.state.state = EmulationState::WaitForSelect;
        self.state.cycle = CycleTracker::new();
        debug!(cycle = %self.state.cycle.cycle_id, "Host emulation activated");
    }

    async fn on_data(&mut self, apdu: Vec<u8>) {
        self.cancel(TimerKind::ReturnToIdle);
        self.cancel(TimerKind::ReenableObserveMode);

        match self.state.state {
            EmulationState::Idle | EmulationState::PollingLoop => {
                error!(state = %self.state.state, "Got data before activation");
                return;
            }
            EmulationState::WaitForDeactivate => {
                debug!("Dropping APDU while waiting for deactivation");
                return;
            }
            EmulationState::WaitForService => {
                debug!("Dropping APDU while waiting for service to bind");
                return;
            }
            _ => {}
        }

        let select_aid = find_select_aid(&apdu);
        let mut resolved: Option<(Arc<CardEmulationService>, Category)> = None;

        if let Some(aid) = &select_aid {
            if aid == PLATFORM_HCE_AID {
                self.respond(&PLATFORM_HCE_RESPONSE).await;
                return;
            }

            let resolution = self.ports.resolver.resolve(aid);
            if resolution.services().is_empty() {
                self.on_unroutable_aid(aid).await;
                return;
            }
            self.clear_unroutable_report();
            self.state.last_selected_aid = Some(aid.clone());
            self.rebind_payment_if_flagged().await;

            let category = resolution.category().unwrap_or_default();
            if let Some(default) = resolution.default_service() {
                if let Some(violation) = self.policy_violation(default) {
                    self.reject(aid, default, category, violation).await;
                    return;
                }
                resolved = Some((Arc::clone(default), category));
            } else if let Some(active) = &self.state.active {
                if let Some(service) = resolution.find(&active.service.component) {
                    debug!(aid = %aid, component = %service.component, "Conflict resolved to active service");
                    resolved = Some((Arc::clone(service), category));
                }
            }

            if resolved.is_none() {
                self.state.state = EmulationState::WaitForDeactivate;
                let candidates = resolution.services();
                info!(aid = %aid, candidates = candidates.len(), "AID conflict, asking the user");
                self.ports.diagnostics.emit(CardEmulationEvent::AidConflict {
                    aid: aid.clone(),
                    candidates: candidates.iter().map(|s| s.component.clone()).collect(),
                    category,
                });
                self.ports.prompts.show_chooser(candidates, None, category);
                return;
            }
        }

        match self.state.state {
            EmulationState::WaitForSelect => match resolved {
                Some((service, category)) => {
                    self.state.cycle.select_dispatched(category);
                    self.dispatch_select(&service, apdu).await;
                }
                None => {
                    debug!("Dropping non-select APDU in W4_SELECT");
                    self.respond(&UNKNOWN_ERROR).await;
                }
            },
            EmulationState::Xfer => {
                if let Some((service, _)) = resolved {
                    self.dispatch_select(&service, apdu).await;
                } else if let Some(active) = self.state.active.clone() {
                    self.send_data(active, apdu).await;
                } else {
                    debug!("Service no longer bound, dropping APDU");
                }
            }
            _ => {}
        }
    }

    async fn on_deactivated(&mut self) {
        if self.state.state == EmulationState::Idle {
            warn!("Got deactivation event while idle");
        }
        self.send_deactivate_to_active(DeactivationReason::LinkLoss)
            .await;
        self.unbind_session_if_needed().await;
        self.record_outcome();
        self.cancel(TimerKind::ReturnToIdle);
        self.state.return_to_idle();

        self.cancel(TimerKind::AutoDisableObserveMode);
        self.state.observe.auto_disable_packages.clear();

        if self.state.observe.reenable_after_transaction {
            debug!("Deactivated, will re-enable observe mode");
            self.schedule(TimerKind::ReenableObserveMode, self.config.observe_reenable_delay);
        }
    }

    async fn on_off_host_selected(&mut self) {
        self.cancel(TimerKind::ReturnToIdle);
        self.cancel(TimerKind::ReenableObserveMode);
        if self.state.state == EmulationState::Xfer {
            self.send_deactivate_to_active(DeactivationReason::Deselected)
                .await;
        }
        if self.state.observe.reenable_after_transaction {
            info!("Off-host AID selected, waiting for field off to re-enable observe mode");
            self.state.observe.reenable_on_field_off = true;
        }
        self.state.reset_active();
        self.unbind_session_if_needed().await;
        self.state.state = EmulationState::WaitForSelect;
        self.ports.prompts.dismiss_tap_again();
    }

    fn on_observe_mode_changed(&mut self, enabled: bool) {
        if !enabled {
            self.cancel(TimerKind::AutoDisableObserveMode);
            self.state.observe.auto_disable_packages.clear();
        }
    }

    // =========================================================================
    // SELECT HANDLING
    // =========================================================================

    async fn on_unroutable_aid(&mut self, aid: &str) {
        if is_ndef_aid(aid) {
            warn!(aid = %aid, "Can't route NDEF AID, sending AID_NOT_FOUND");
        } else if !self.ports.device.is_screen_on() {
            info!(aid = %aid, "Screen is off, sending AID_NOT_FOUND without a report");
        } else {
            warn!(aid = %aid, "Can't handle AID, sending AID_NOT_FOUND");
            self.state.unroutable_aids.push(aid.to_string());
            if !self.state.timers.is_armed(TimerKind::UnroutableReport) {
                self.schedule(TimerKind::UnroutableReport, self.config.unroutable_report_delay);
            }
        }
        self.respond(&AID_NOT_FOUND).await;
    }

    fn clear_unroutable_report(&mut self) {
        self.cancel(TimerKind::UnroutableReport);
        self.state.unroutable_aids.clear();
    }

    /// First policy gate `service` fails, if any.
    fn policy_violation(&self, service: &CardEmulationService) -> Option<PolicyViolationKind> {
        let device = &self.ports.device;
        if (service.requires_unlock || device.is_secure_nfc_enabled()) && device.is_keyguard_locked() {
            return Some(PolicyViolationKind::DeviceLocked);
        }
        if service.requires_screen_on && !device.is_screen_on() {
            return Some(PolicyViolationKind::ScreenOff);
        }
        if !service.on_host {
            error!(
                component = %service.component,
                "AID meant to go off-host was routed to host; check routing table configuration"
            );
            return Some(PolicyViolationKind::NotOnHost);
        }
        None
    }

    async fn reject(
        &mut self,
        aid: &str,
        service: &CardEmulationService,
        category: Category,
        violation: PolicyViolationKind,
    ) {
        debug!(aid = %aid, component = %service.component, ?violation, "Default service rejected");
        if violation == PolicyViolationKind::DeviceLocked {
            self.ports.prompts.request_unlock();
        }
        self.respond(&AID_NOT_FOUND).await;
        metrics::record_policy_rejection(gate_label(violation));
        self.ports.diagnostics.emit(CardEmulationEvent::PolicyViolation {
            aid: aid.to_string(),
            service: service.component.clone(),
            violation,
        });
        if violation == PolicyViolationKind::DeviceLocked {
            self.ports.prompts.show_tap_again(service, category);
        }
    }

    /// Forward a SELECT to `service`, binding it first if needed.
    async fn dispatch_select(&mut self, service: &CardEmulationService, apdu: Vec<u8>) {
        match self.bind_if_needed(service.user_id, &service.component).await {
            Some(target) => {
                debug!(component = %service.component, "Forwarding SELECT to bound service");
                self.send_data(target, apdu).await;
            }
            None if self.bind_in_flight(service.user_id, &service.component) => {
                debug!(component = %service.component, "Waiting for service to bind");
                self.state.pending_select = Some((service.component.clone(), apdu));
                self.state.state = EmulationState::WaitForService;
                self.state.cycle.bind_started();
            }
            None => {
                warn!(component = %service.component, "No bind in flight, sending AID_NOT_FOUND");
                self.state.cycle.bind_started();
                self.state.state = EmulationState::WaitForSelect;
                self.respond(&AID_NOT_FOUND).await;
            }
        }
    }

    /// A session or payment bind for `component` was started and has not
    /// completed.
    fn bind_in_flight(&self, user: UserId, component: &ComponentName) -> bool {
        let payment = &self.state.payment;
        let payment_pending = payment.bound.is_none()
            && payment
                .started
                .as_ref()
                .is_some_and(|r| &r.component == component && r.user == user);
        payment_pending || self.state.session_binding.is_pending(component, user)
    }

    async fn send_data(&mut self, target: ActiveService, apdu: Vec<u8>) {
        self.state.state = EmulationState::Xfer;
        self.activate(&target).await;
        let component = &target.service.component;
        match target.service.channel.send_command_apdu(&apdu).await {
            Ok(()) => metrics::record_apdu_forwarded(),
            Err(err) => warn!(component = %component, error = %err, "Service has died, dropping APDU"),
        }
    }

    async fn respond(&self, apdu: &[u8]) {
        if let Err(err) = self.ports.radio.send_response(apdu).await {
            warn!(error = %err, "Failed to send response APDU");
        }
    }

    // =========================================================================
    // SERVICE REPLIES
    // =========================================================================

    async fn on_service_response(&mut self, from: ComponentName, apdu: Vec<u8>) {
        if !self.state.is_active(&from) {
            debug!(component = %from, "Dropping response; service no longer active");
            return;
        }
        if apdu.is_empty() {
            error!(component = %from, "Dropping empty R-APDU");
            return;
        }
        if self.state.state != EmulationState::Xfer {
            debug!(state = %self.state.state, "Dropping response, wrong state");
            return;
        }
        self.respond(&apdu).await;
        self.state.cycle.response_received();
    }

    fn on_service_unhandled(&mut self, from: ComponentName) {
        if !self.state.is_active(&from) {
            debug!(component = %from, "Dropping UNHANDLED; service no longer active");
            return;
        }
        let Some(aid) = self.state.last_selected_aid.clone() else {
            return;
        };
        let resolution = self.ports.resolver.resolve(&aid);
        let candidates = resolution.services();
        if candidates.is_empty() {
            return;
        }
        let category = resolution.category().unwrap_or_default();
        info!(aid = %aid, failed = %from, "Service declined AID, asking the user");
        self.ports.diagnostics.emit(CardEmulationEvent::AidConflict {
            aid,
            candidates: candidates.iter().map(|s| s.component.clone()).collect(),
            category,
        });
        self.ports.prompts.show_chooser(candidates, Some(&from), category);
    }

    // =========================================================================
    // BINDING
    // =========================================================================

    /// Channel to `component` if already bound; otherwise start a bind and
    /// return `None`.
    async fn bind_if_needed(&mut self, user: UserId, component: &ComponentName) -> Option<ActiveService> {
        if let Some(bound) = &self.state.payment.bound {
            if bound.is(component, user) {
                debug!(component = %component, "Service already bound as payment service");
                return Some(ActiveService {
                    kind: BindingKind::Payment,
                    service: bound.clone(),
                });
            }
        }

        let is_preferred_payment = self
            .state
            .preferred_payment
            .as_ref()
            .is_some_and(|(u, c)| *u == user && c == component);
        let payment = &self.state.payment;
        if payment.started.is_none() && !payment.rebind_on_next_selection && is_preferred_payment {
            debug!(component = %component, "Service should be bound as payment service, binding now");
            self.bind_payment(user, component.clone()).await;
            return None;
        }

        if let Some(bound) = &self.state.session_binding.bound {
            if bound.is(component, user) {
                debug!(component = %component, "Service already bound as regular service");
                return Some(ActiveService {
                    kind: BindingKind::Session,
                    service: bound.clone(),
                });
            }
        }
        if self.state.session_binding.is_pending(component, user) {
            return None;
        }

        self.unbind_session_if_needed().await;
        let request = self.next_request(component.clone(), user, BindingKind::Session);
        debug!(component = %component, user, epoch = request.epoch, "Binding to service");
        match self.ports.binder.bind(request.clone()).await {
            Ok(()) => self.state.session_binding.pending = Some(request),
            Err(err) => error!(component = %component, error = %err, "Could not bind service"),
        }
        None
    }

    fn next_request(&mut self, component: ComponentName, user: UserId, kind: BindingKind) -> BindRequest {
        self.state.epoch += 1;
        BindRequest {
            component,
            user,
            kind,
            epoch: self.state.epoch,
        }
    }

    async fn unbind_session_if_needed(&mut self) {
        let binding = &mut self.state.session_binding;
        let request = match (binding.bound.take(), binding.pending.take()) {
            (Some(bound), _) => Some(bound.request(BindingKind::Session)),
            (None, Some(pending)) => Some(pending),
            (None, None) => None,
        };
        if let Some(request) = request {
            debug!(component = %request.component, epoch = request.epoch, "Unbinding from service");
            self.ports.binder.unbind(&request).await;
        }
    }

    async fn bind_payment(&mut self, user: UserId, component: ComponentName) {
        self.unbind_payment().await;
        debug!(component = %component, user, "Binding to payment service");
        let request = self.next_request(component.clone(), user, BindingKind::Payment);
        self.state.payment.requested = Some((user, component.clone()));
        match self.ports.binder.bind(request.clone()).await {
            Ok(()) => {
                self.state.payment.started = Some(request);
                self.state.payment.rebind_on_next_selection = false;
            }
            Err(err) => {
                error!(component = %component, error = %err, "Could not bind payment service");
                self.state.payment.rebind_on_next_selection = true;
            }
        }
    }

    async fn unbind_payment(&mut self) {
        let payment = &mut self.state.payment;
        payment.bound = None;
        if let Some(request) = payment.started.take() {
            debug!(component = %request.component, epoch = request.epoch, "Unbinding payment service");
            self.ports.binder.unbind(&request).await;
        }
    }

    async fn rebind_payment_if_flagged(&mut self) {
        if !self.state.payment.rebind_on_next_selection {
            return;
        }
        if let Some((user, component)) = self.state.payment.requested.clone() {
            info!(component = %component, "Retrying payment service bind");
            self.bind_payment(user, component).await;
        }
    }

    async fn on_service_bound(
        &mut self,
        component: ComponentName,
        user: UserId,
        kind: BindingKind,
        epoch: u64,
        channel: Arc<dyn ServiceChannel>,
    ) {
        let bound = BoundService {
            component: component.clone(),
            user,
            epoch,
            channel,
        };
        match kind {
            BindingKind::Payment => {
                let current = self
                    .state
                    .payment
                    .started
                    .as_ref()
                    .is_some_and(|r| r.component == component && r.epoch == epoch);
                if !current {
                    info!(component = %component, epoch, "Ignoring bound payment service; no longer requested");
                    return;
                }
                info!(component = %component, "Payment service bound");
                self.state.payment.bound = Some(bound.clone());
            }
            BindingKind::Session => {
                let current = self
                    .state
                    .session_binding
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.component == component && p.epoch == epoch);
                if !current {
                    // Its request was unbound when it stopped being pending
                    debug!(component = %component, epoch, "Discarding stale bind completion");
                    return;
                }
                debug!(component = %component, "Service bound");
                self.state.session_binding.pending = None;
                self.state.session_binding.bound = Some(bound.clone());
            }
        }

        let target = ActiveService {
            kind,
            service: bound,
        };
        let select_waiting = self
            .state
            .pending_select
            .as_ref()
            .is_some_and(|(name, _)| name == &component);
        if select_waiting {
            if let Some((_, apdu)) = self.state.pending_select.take() {
                self.state.cycle.bind_completed();
                self.send_data(target, apdu).await;
            }
        } else if let Some(frames) = self.state.frames_to_send.remove(&component) {
            self.send_polling_frames(target, frames).await;
            if let Some(unprocessed) = self.state.unprocessed_frames.take() {
                self.process_frames(unprocessed).await;
            }
        } else {
            debug!(component = %component, "Bound with nothing to send");
        }
    }

    fn on_service_disconnected(&mut self, component: &ComponentName, kind: BindingKind) {
        info!(component = %component, ?kind, "Service disconnected");
        self.forget_binding(component, kind);
    }

    async fn on_binding_died(&mut self, component: &ComponentName, kind: BindingKind) {
        info!(component = %component, ?kind, "Service binding died");
        self.forget_binding(component, kind);
        if kind != BindingKind::Payment {
            return;
        }
        match self.state.payment.requested.clone() {
            Some((user, name)) if user >= 0 && &name == component => {
                self.bind_payment(user, name).await;
            }
            _ => {}
        }
    }

    fn forget_binding(&mut self, component: &ComponentName, kind: BindingKind) {
        let slot = match kind {
            BindingKind::Payment => &mut self.state.payment.bound,
            BindingKind::Session => &mut self.state.session_binding.bound,
        };
        if slot.as_ref().is_some_and(|b| &b.component == component) {
            *slot = None;
        }
        if self
            .state
            .active
            .as_ref()
            .is_some_and(|a| a.kind == kind && &a.service.component == component)
        {
            self.state.reset_active();
        }
    }

    /// Make `target` the active service, telling the previous one it was
    /// deselected.
    async fn activate(&mut self, target: &ActiveService) {
        let same = self.state.active.as_ref().is_some_and(|a| {
            a.kind == target.kind && a.service.component == target.service.component
        });
        if !same {
            self.send_deactivate_to_active(DeactivationReason::Deselected)
                .await;
            self.state.active = Some(target.clone());
        }
    }

    async fn send_deactivate_to_active(&self, reason: DeactivationReason) {
        let Some(active) = &self.state.active else {
            return;
        };
        if let Err(err) = active.service.channel.send_deactivated(reason).await {
            debug!(component = %active.service.component, error = %err, "Deactivation notice not delivered");
        }
    }

    // =========================================================================
    // PREFERENCES
    // =========================================================================

    async fn on_preferred_payment_changed(&mut self, user: UserId, component: Option<ComponentName>) {
        if !self.state.state.is_activated() {
            debug!("Preferred payment service changed, resetting active service");
            self.state.reset_active();
        }
        self.state.preferred_payment = component.clone().map(|c| (user, c));
        match component {
            Some(component) => self.bind_payment(user, component).await,
            None => self.unbind_payment().await,
        }
    }

    async fn on_preferred_foreground_changed(&mut self, user: UserId, component: Option<ComponentName>) {
        if !self.state.state.is_activated() {
            debug!("Preferred foreground service changed, resetting active service");
            self.state.reset_active();
        }
        match component {
            Some(component) => {
                self.bind_if_needed(user, &component).await;
            }
            None => self.unbind_session_if_needed().await,
        }
    }

    // =========================================================================
    // POLLING LOOP
    // =========================================================================

    async fn on_polling_loop(&mut self, frames: Vec<PollingFrame>) {
        debug!(frames = frames.len(), "Polling loop detected");
        self.cancel(TimerKind::ReturnToIdle);
        if frames
            .last()
            .is_some_and(|f| f.frame_type == PollingFrameType::Off)
        {
            self.schedule(TimerKind::ReturnToIdle, self.config.idle_delay);
        }
        self.process_frames(frames).await;
    }

    async fn process_frames(&mut self, frames: Vec<PollingFrame>) {
        if self.state.state == EmulationState::Idle {
            self.state.state = EmulationState::PollingLoop;
        }

        for frame in frames {
            if let Some(unprocessed) = self.state.unprocessed_frames.as_mut() {
                unprocessed.push(frame);
                continue;
            }
            match frame.frame_type {
                PollingFrameType::F => {
                    if let Some((component, target)) = self.foreground_or_default().await {
                        self.send_frames(&component, target, vec![frame]).await;
                    }
                }
                PollingFrameType::Unknown => self.on_unknown_frame(frame).await,
                _ => self.state.pending_frames.push(frame),
            }
        }

        if self.state.polling_state == PollingLoopState::Evaluating
            && should_deliver_pending(&self.state.pending_frames)
        {
            self.state.polling_state = PollingLoopState::DeliveringToPreferred;
        }

        if self.state.polling_state == PollingLoopState::DeliveringToPreferred {
            match self.foreground_or_default().await {
                Some((component, target)) => {
                    let pending = mem::take(&mut self.state.pending_frames);
                    if !pending.is_empty() {
                        self.send_frames(&component, target, pending).await;
                    }
                }
                None => {
                    info!("No preferred service to deliver polling frames to, allowing transaction");
                    self.allow_one_transaction().await;
                }
            }
        }
    }

    async fn on_unknown_frame(&mut self, mut frame: PollingFrame) {
        let data_hex = frame.data_hex();
        let matches = self.state.filters.matching(&data_hex);
        if matches.is_empty() {
            if let Some((component, target)) = self.foreground_or_default().await {
                self.send_frames(&component, target, vec![frame]).await;
            }
            return;
        }

        let foreground = self.ports.resolver.foreground_service();
        let wallet_holder = self.ports.resolver.wallet_role_holder();
        let ctx = TieBreakContext {
            foreground: foreground.as_ref(),
            wallet_holder: wallet_holder.as_deref(),
            preferred_payment: self.state.preferred_payment.as_ref().map(|(_, c)| c),
        };
        let Some(chosen) = break_tie(&matches, &ctx).map(|m| Arc::clone(&m.service)) else {
            return;
        };

        let auto_transact = matches
            .iter()
            .any(|m| m.auto_transact && m.service.component == chosen.component);
        if auto_transact {
            self.allow_one_transaction().await;
            frame.triggered_autotransact = true;
        }
        if chosen.on_host {
            let target = self.bind_if_needed(chosen.user_id, &chosen.component).await;
            self.state.polling_state = PollingLoopState::FilterMatched;
            self.send_frames(&chosen.component, target, vec![frame]).await;
        }
    }

    /// Foreground service, else the wallet holder's payment service, binding
    /// it if needed.
    async fn foreground_or_default(&mut self) -> Option<(ComponentName, Option<ActiveService>)> {
        let service = self.ports.resolver.preferred_service()?;
        let target = self.bind_if_needed(service.user_id, &service.component).await;
        Some((service.component.clone(), target))
    }

    /// Deliver `frames` now, or hold them until `component` is bound.
    async fn send_frames(
        &mut self,
        component: &ComponentName,
        target: Option<ActiveService>,
        frames: Vec<PollingFrame>,
    ) {
        match target {
            Some(target) => self.send_polling_frames(target, frames).await,
            None => {
                self.state.unprocessed_frames = Some(Vec::new());
                self.state
                    .frames_to_send
                    .entry(component.clone())
                    .or_default()
                    .extend(frames);
            }
        }

        if self.config.auto_disable_observe_mode {
            let package = component.package.clone();
            if !self.state.timers.is_armed(TimerKind::AutoDisableObserveMode) {
                self.state.observe.auto_disable_packages = vec![package];
                self.schedule(
                    TimerKind::AutoDisableObserveMode,
                    self.config.auto_disable_observe_delay,
                );
            } else if !self.state.observe.auto_disable_packages.contains(&package) {
                self.state.observe.auto_disable_packages.push(package);
            }
        }
    }

    async fn send_polling_frames(&mut self, target: ActiveService, frames: Vec<PollingFrame>) {
        self.activate(&target).await;
        if self.state.state == EmulationState::Idle {
            self.state.state = EmulationState::PollingLoop;
        }
        match target.service.channel.send_polling_frames(&frames).await {
            Ok(()) => metrics::record_polling_frames(frames.len()),
            Err(err) => {
                error!(component = %target.service.component, error = %err, "Service has died, dropping frames");
                self.allow_one_transaction().await;
            }
        }
    }

    /// Lift observe mode so the next transaction can complete.
    async fn allow_one_transaction(&mut self) {
        debug!("Disabling observe mode for one transaction");
        self.state.observe.reenable_after_transaction = true;
        self.set_observe_mode(false).await;
    }

    async fn set_observe_mode(&self, enabled: bool) {
        match self.ports.radio.set_observe_mode(enabled).await {
            Ok(()) => self
                .ports
                .diagnostics
                .emit(CardEmulationEvent::ObserveModeChanged { enabled }),
            Err(err) => warn!(enabled, error = %err, "Failed to switch observe mode"),
        }
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        let token = self.state.timers.next_token();
        let queue = self.queue.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(queue) = queue.upgrade() {
                let _ = queue.send(SessionEvent::Timer { kind, token });
            }
        });
        self.state.timers.arm(kind, token, task.abort_handle());
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.state.timers.cancel(kind);
    }

    async fn on_timer(&mut self, kind: TimerKind, token: u64) {
        if !self.state.timers.take_if_current(kind, token) {
            debug!(?kind, token, "Ignoring cancelled timer");
            return;
        }
        match kind {
            TimerKind::ReturnToIdle => {
                debug!("Have been outside field, returning to idle state");
                self.state.return_to_idle();
            }
            TimerKind::ReenableObserveMode => {
                debug!("Re-enabling observe mode after transaction");
                self.state.observe.reenable_after_transaction = false;
                self.state.observe.reenable_on_field_off = false;
                self.set_observe_mode(true).await;
            }
            TimerKind::AutoDisableObserveMode => {
                let packages = mem::take(&mut self.state.observe.auto_disable_packages);
                if !self.ports.radio.is_observe_mode_enabled() {
                    return;
                }
                let foreground = self.ports.device.foreground_packages();
                if packages.iter().any(|p| foreground.contains(p)) {
                    return;
                }
                warn!(
                    packages = %packages.join(", "),
                    "Observe mode still enabled and no target app in the foreground"
                );
                self.allow_one_transaction().await;
            }
            TimerKind::UnroutableReport => {
                let aids = mem::take(&mut self.state.unroutable_aids);
                if !aids.is_empty() {
                    warn!(aids = %aids.join(", "), "NFC tap failed, AIDs could not be routed");
                    self.ports
                        .diagnostics
                        .emit(CardEmulationEvent::UnroutableAids { aids });
                }
            }
        }
    }

    fn record_outcome(&mut self) {
        let cycle = mem::take(&mut self.state.cycle);
        let Some((outcome, category)) = cycle.outcome() else {
            return;
        };
        info!(
            cycle = %cycle.cycle_id,
            outcome = outcome.as_str(),
            %category,
            "Host emulation deactivated"
        );
        metrics::record_deactivation(outcome.as_str());
        self.ports
            .diagnostics
            .emit(CardEmulationEvent::SessionDeactivated {
                cycle_id: cycle.cycle_id,
                outcome,
                category,
            });
    }
}

fn gate_label(violation: PolicyViolationKind) -> &'static str {
    match violation {
        PolicyViolationKind::DeviceLocked => "device_locked",
        PolicyViolationKind::ScreenOff => "screen_off",
        PolicyViolationKind::NotOnHost => "not_on_host",
    }
}
