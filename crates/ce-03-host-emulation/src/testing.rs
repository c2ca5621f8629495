//! Test doubles shared by the session and driver tests.

use crate::driver::{SessionDriver, SessionHandle};
use crate::error::{SessionError, SessionResult};
use crate::events::SessionEvent;
use crate::ports::outbound::{
    BindRequest, BindingKind, DeviceState, DiagnosticsSink, RadioTransceiver, ServiceBinder,
    ServiceChannel, UserPrompts,
};
use crate::service::{SessionConfig, SessionPorts};
use async_trait::async_trait;
use ce_01_aid_resolution::{AidResolutionApi, AidResolutionService, ResolutionConfig, ServiceRegistry};
use parking_lot::Mutex;
use shared_bus::CardEmulationEvent;
use shared_types::{
    AidPattern, CardEmulationService, Category, ComponentName, DeactivationReason, PollingFrame,
    UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) const PAY_AID: &str = "A0000000031010";
pub(crate) const LOYALTY_AID: &str = "F0010203040506";

// =============================================================================
// Mock Implementations
// =============================================================================

pub(crate) struct EmptyRegistry;

impl ServiceRegistry for EmptyRegistry {
    fn installed_services(&self, _user: UserId) -> Vec<CardEmulationService> {
        Vec::new()
    }
}

pub(crate) struct MockRadio {
    pub responses: Mutex<Vec<Vec<u8>>>,
    pub observe_mode: AtomicBool,
    pub observe_calls: Mutex<Vec<bool>>,
}

impl MockRadio {
    fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            observe_mode: AtomicBool::new(true),
            observe_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn take_responses(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.responses.lock())
    }
}

#[async_trait]
impl RadioTransceiver for MockRadio {
    async fn send_response(&self, apdu: &[u8]) -> SessionResult<()> {
        self.responses.lock().push(apdu.to_vec());
        Ok(())
    }

    async fn set_observe_mode(&self, enabled: bool) -> SessionResult<()> {
        self.observe_mode.store(enabled, Ordering::SeqCst);
        self.observe_calls.lock().push(enabled);
        Ok(())
    }

    fn is_observe_mode_enabled(&self) -> bool {
        self.observe_mode.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct MockBinder {
    /// Binds that started
    pub requests: Mutex<Vec<BindRequest>>,
    /// Every bind call, including refused ones
    pub attempts: Mutex<Vec<BindRequest>>,
    pub unbinds: Mutex<Vec<BindRequest>>,
    pub fail: AtomicBool,
}

impl MockBinder {
    pub fn last_request(&self) -> BindRequest {
        self.requests.lock().last().cloned().expect("no bind requested")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn attempts_of(&self, kind: BindingKind) -> usize {
        self.attempts.lock().iter().filter(|r| r.kind == kind).count()
    }

    pub fn unbound(&self, component: &ComponentName, kind: BindingKind) -> bool {
        self.unbinds
            .lock()
            .iter()
            .any(|r| &r.component == component && r.kind == kind)
    }
}

#[async_trait]
impl ServiceBinder for MockBinder {
    async fn bind(&self, request: BindRequest) -> SessionResult<()> {
        self.attempts.lock().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::Bind {
                component: request.component,
                reason: "refused".into(),
            });
        }
        self.requests.lock().push(request);
        Ok(())
    }

    async fn unbind(&self, request: &BindRequest) {
        self.unbinds.lock().push(request.clone());
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChannelCall {
    Apdu(Vec<u8>),
    Deactivated(DeactivationReason),
    Frames(Vec<PollingFrame>),
}

#[derive(Debug, Default)]
pub(crate) struct MockChannel {
    pub calls: Mutex<Vec<ChannelCall>>,
    pub dead: AtomicBool,
}

impl MockChannel {
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().clone()
    }

    pub fn apdus(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChannelCall::Apdu(apdu) => Some(apdu),
                _ => None,
            })
            .collect()
    }

    pub fn frames(&self) -> Vec<PollingFrame> {
        self.calls()
            .into_iter()
            .flat_map(|c| match c {
                ChannelCall::Frames(frames) => frames,
                _ => Vec::new(),
            })
            .collect()
    }

    fn record(&self, call: ChannelCall) -> SessionResult<()> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(SessionError::ServiceUnreachable {
                component: ComponentName::new("mock", ".Dead"),
                reason: "dead".into(),
            });
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl ServiceChannel for MockChannel {
    async fn send_command_apdu(&self, apdu: &[u8]) -> SessionResult<()> {
        self.record(ChannelCall::Apdu(apdu.to_vec()))
    }

    async fn send_deactivated(&self, reason: DeactivationReason) -> SessionResult<()> {
        self.record(ChannelCall::Deactivated(reason))
    }

    async fn send_polling_frames(&self, frames: &[PollingFrame]) -> SessionResult<()> {
        self.record(ChannelCall::Frames(frames.to_vec()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PromptCall {
    Chooser {
        candidates: Vec<ComponentName>,
        failed: Option<ComponentName>,
    },
    TapAgain(ComponentName),
    DismissTapAgain,
    Unlock,
}

#[derive(Default)]
pub(crate) struct MockPrompts {
    pub calls: Mutex<Vec<PromptCall>>,
}

impl MockPrompts {
    pub fn calls(&self) -> Vec<PromptCall> {
        self.calls.lock().clone()
    }

    pub fn choosers(&self) -> Vec<PromptCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PromptCall::Chooser { .. }))
            .collect()
    }
}

impl UserPrompts for MockPrompts {
    fn show_chooser(
        &self,
        candidates: &[Arc<CardEmulationService>],
        failed_component: Option<&ComponentName>,
        _category: Category,
    ) {
        self.calls.lock().push(PromptCall::Chooser {
            candidates: candidates.iter().map(|s| s.component.clone()).collect(),
            failed: failed_component.cloned(),
        });
    }

    fn show_tap_again(&self, service: &CardEmulationService, _category: Category) {
        self.calls
            .lock()
            .push(PromptCall::TapAgain(service.component.clone()));
    }

    fn dismiss_tap_again(&self) {
        self.calls.lock().push(PromptCall::DismissTapAgain);
    }

    fn request_unlock(&self) {
        self.calls.lock().push(PromptCall::Unlock);
    }
}

pub(crate) struct MockDevice {
    pub locked: AtomicBool,
    pub screen_on: AtomicBool,
    pub secure_nfc: AtomicBool,
    pub foreground: Mutex<Vec<String>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            locked: AtomicBool::new(false),
            screen_on: AtomicBool::new(true),
            secure_nfc: AtomicBool::new(false),
            foreground: Mutex::new(Vec::new()),
        }
    }
}

impl DeviceState for MockDevice {
    fn is_keyguard_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn is_screen_on(&self) -> bool {
        self.screen_on.load(Ordering::SeqCst)
    }

    fn is_secure_nfc_enabled(&self) -> bool {
        self.secure_nfc.load(Ordering::SeqCst)
    }

    fn foreground_packages(&self) -> Vec<String> {
        self.foreground.lock().clone()
    }
}

#[derive(Default)]
pub(crate) struct MockDiagnostics {
    pub events: Mutex<Vec<CardEmulationEvent>>,
}

impl MockDiagnostics {
    pub fn events(&self) -> Vec<CardEmulationEvent> {
        self.events.lock().clone()
    }
}

impl DiagnosticsSink for MockDiagnostics {
    fn emit(&self, event: CardEmulationEvent) {
        self.events.lock().push(event);
    }
}

// =============================================================================
// Harness
// =============================================================================

pub(crate) struct Harness {
    pub driver: SessionDriver,
    pub handle: SessionHandle,
    pub resolver: Arc<AidResolutionService<EmptyRegistry>>,
    pub radio: Arc<MockRadio>,
    pub binder: Arc<MockBinder>,
    pub prompts: Arc<MockPrompts>,
    pub device: Arc<MockDevice>,
    pub diagnostics: Arc<MockDiagnostics>,
}

impl Harness {
    pub fn new(services: Vec<CardEmulationService>) -> Self {
        Self::with_config(SessionConfig::default(), services)
    }

    pub fn with_config(config: SessionConfig, services: Vec<CardEmulationService>) -> Self {
        let resolver = Arc::new(AidResolutionService::new(
            ResolutionConfig::default(),
            Arc::new(EmptyRegistry),
        ));
        resolver.on_services_updated(0, services);

        let radio = Arc::new(MockRadio::new());
        let binder = Arc::new(MockBinder::default());
        let prompts = Arc::new(MockPrompts::default());
        let device = Arc::new(MockDevice::default());
        let diagnostics = Arc::new(MockDiagnostics::default());

        let ports = SessionPorts {
            resolver: resolver.clone(),
            radio: radio.clone(),
            binder: binder.clone(),
            prompts: prompts.clone(),
            device: device.clone(),
            diagnostics: diagnostics.clone(),
        };
        let (driver, handle) = SessionDriver::new(config, ports);
        Self {
            driver,
            handle,
            resolver,
            radio,
            binder,
            prompts,
            device,
            diagnostics,
        }
    }

    /// Let spawned timers run, then handle everything queued.
    pub async fn settle(&mut self) {
        loop {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            if self.driver.drain().await == 0 {
                break;
            }
        }
    }

    /// Complete `request` with a fresh channel.
    pub fn complete_bind(&self, request: &BindRequest) -> Arc<MockChannel> {
        let channel = Arc::new(MockChannel::default());
        self.handle
            .send(SessionEvent::ServiceBound {
                component: request.component.clone(),
                user: request.user,
                kind: request.kind,
                epoch: request.epoch,
                channel: channel.clone(),
            })
            .expect("session queue open");
        channel
    }

    pub fn reply(&self, from: &ComponentName, apdu: &[u8]) {
        self.handle
            .send(SessionEvent::ServiceResponse {
                from: from.clone(),
                apdu: apdu.to_vec(),
            })
            .expect("session queue open");
    }
}

pub(crate) fn host_service(pkg: &str, aid: &str, category: Category) -> CardEmulationService {
    let pattern = AidPattern::parse(aid).expect("valid AID");
    CardEmulationService::host(ComponentName::new(pkg, ".Service"), 0).with_aid(pattern, category)
}

pub(crate) fn component(pkg: &str) -> ComponentName {
    ComponentName::new(pkg, ".Service")
}
