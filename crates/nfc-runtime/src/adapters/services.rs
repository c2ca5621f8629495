//! # Loopback Services
//!
//! In-process stand-ins for card emulation service processes. A bind
//! completes immediately by enqueueing `ServiceBound` on the session queue;
//! every command APDU is answered with the service's canned response.
//!
//! ```text
//! Session ──bind──→ LoopbackBinder ──ServiceBound──→ session queue
//! Session ──APDU──→ LoopbackChannel ──ServiceResponse──→ session queue
//! ```

use async_trait::async_trait;
use ce_03_host_emulation::{
    BindRequest, BindingKind, ServiceBinder, ServiceChannel, SessionError, SessionEvent,
    SessionHandle, SessionResult,
};
use nfc_telemetry::log_service_event;
use parking_lot::{Mutex, RwLock};
use shared_types::{ComponentName, DeactivationReason, PollingFrame};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Status word every loopback service answers with unless configured.
pub const DEFAULT_RESPONSE: [u8; 2] = [0x90, 0x00];

/// One live connection: component, binding slot and bind epoch.
type BindKey = (ComponentName, BindingKind, u64);

fn bind_key(request: &BindRequest) -> BindKey {
    (request.component.clone(), request.kind, request.epoch)
}

/// Binder that "starts" loopback services on the session queue.
#[derive(Default)]
pub struct LoopbackBinder {
    session: RwLock<Option<SessionHandle>>,
    responses: RwLock<HashMap<ComponentName, Vec<u8>>>,
    refused: RwLock<HashSet<ComponentName>>,
    bound: Mutex<HashMap<BindKey, Arc<LoopbackChannel>>>,
    binds: AtomicUsize,
}

impl LoopbackBinder {
    /// Route bind completions to `session`.
    pub fn attach(&self, session: SessionHandle) {
        *self.session.write() = Some(session);
    }

    /// Stop completing binds. Drops the binder's session handle and every
    /// live channel.
    pub fn detach(&self) {
        self.session.write().take();
        self.bound.lock().clear();
    }

    /// Canned response APDU for `component`.
    pub fn set_response(&self, component: ComponentName, apdu: Vec<u8>) {
        self.responses.write().insert(component, apdu);
    }

    /// Make binds to `component` fail to start.
    pub fn refuse(&self, component: ComponentName) {
        self.refused.write().insert(component);
    }

    pub fn allow(&self, component: &ComponentName) {
        self.refused.write().remove(component);
    }

    pub fn is_bound(&self, component: &ComponentName, kind: BindingKind) -> bool {
        self.bound
            .lock()
            .keys()
            .any(|(name, k, _)| name == component && *k == kind)
    }

    /// Connections currently held for `component` in slot `kind`.
    pub fn connection_count(&self, component: &ComponentName, kind: BindingKind) -> usize {
        self.bound
            .lock()
            .keys()
            .filter(|(name, k, _)| name == component && *k == kind)
            .count()
    }

    /// Channel of the newest live bind of `component` in slot `kind`.
    pub fn channel(&self, component: &ComponentName, kind: BindingKind) -> Option<Arc<LoopbackChannel>> {
        self.bound
            .lock()
            .iter()
            .filter(|((name, k, _), _)| name == component && *k == kind)
            .max_by_key(|((_, _, epoch), _)| *epoch)
            .map(|(_, channel)| channel.clone())
    }

    /// Binds started so far.
    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceBinder for LoopbackBinder {
    async fn bind(&self, request: BindRequest) -> SessionResult<()> {
        if self.refused.read().contains(&request.component) {
            return Err(SessionError::Bind {
                component: request.component,
                reason: "service not found".into(),
            });
        }
        let session = self.session.read().clone().ok_or_else(|| SessionError::Bind {
            component: request.component.clone(),
            reason: "session not attached".into(),
        })?;

        let response = self
            .responses
            .read()
            .get(&request.component)
            .cloned()
            .unwrap_or_else(|| DEFAULT_RESPONSE.to_vec());
        let channel = Arc::new(LoopbackChannel::new(
            request.component.clone(),
            response,
            session.clone(),
        ));
        self.bound.lock().insert(bind_key(&request), channel.clone());
        self.binds.fetch_add(1, Ordering::SeqCst);
        log_service_event!(debug, "runtime", "Loopback bind started", request.component, kind = ?request.kind, epoch = request.epoch);

        session.send(SessionEvent::ServiceBound {
            component: request.component,
            user: request.user,
            kind: request.kind,
            epoch: request.epoch,
            channel,
        })
    }

    async fn unbind(&self, request: &BindRequest) {
        if self.bound.lock().remove(&bind_key(request)).is_some() {
            log_service_event!(debug, "runtime", "Loopback unbound", request.component, kind = ?request.kind, epoch = request.epoch);
        }
    }
}

/// Command channel of one loopback service.
pub struct LoopbackChannel {
    component: ComponentName,
    response: Vec<u8>,
    session: SessionHandle,
    commands: Mutex<Vec<Vec<u8>>>,
    deactivations: Mutex<Vec<DeactivationReason>>,
    frames: AtomicUsize,
}

impl std::fmt::Debug for LoopbackChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackChannel")
            .field("component", &self.component)
            .field("response", &hex::encode_upper(&self.response))
            .finish()
    }
}

impl LoopbackChannel {
    fn new(component: ComponentName, response: Vec<u8>, session: SessionHandle) -> Self {
        Self {
            component,
            response,
            session,
            commands: Mutex::new(Vec::new()),
            deactivations: Mutex::new(Vec::new()),
            frames: AtomicUsize::new(0),
        }
    }

    /// Command APDUs received, oldest first.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.commands.lock().clone()
    }

    pub fn deactivations(&self) -> Vec<DeactivationReason> {
        self.deactivations.lock().clone()
    }

    /// Polling frames delivered so far.
    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    fn unreachable(&self) -> SessionError {
        SessionError::ServiceUnreachable {
            component: self.component.clone(),
            reason: "session queue closed".into(),
        }
    }
}

#[async_trait]
impl ServiceChannel for LoopbackChannel {
    async fn send_command_apdu(&self, apdu: &[u8]) -> SessionResult<()> {
        debug!(
            component = %self.component,
            command = %hex::encode_upper(apdu),
            "Loopback command"
        );
        self.commands.lock().push(apdu.to_vec());
        self.session
            .send(SessionEvent::ServiceResponse {
                from: self.component.clone(),
                apdu: self.response.clone(),
            })
            .map_err(|_| self.unreachable())
    }

    async fn send_deactivated(&self, reason: DeactivationReason) -> SessionResult<()> {
        debug!(component = %self.component, ?reason, "Loopback deactivated");
        self.deactivations.lock().push(reason);
        Ok(())
    }

    async fn send_polling_frames(&self, frames: &[PollingFrame]) -> SessionResult<()> {
        self.frames.fetch_add(frames.len(), Ordering::SeqCst);
        Ok(())
    }
}
