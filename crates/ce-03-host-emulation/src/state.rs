//! Mutable session state
//!
//! Owned by the session and touched only while handling one event.

use crate::domain::{CycleTracker, EmulationState, PollingFilterIndex, PollingLoopState};
use crate::events::TimerKind;
use crate::ports::outbound::{BindRequest, BindingKind, ServiceChannel};
use shared_types::{ComponentName, PollingFrame, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::AbortHandle;

/// A service with an established channel.
#[derive(Clone, Debug)]
pub struct BoundService {
    pub component: ComponentName,
    pub user: UserId,
    /// Epoch of the bind that produced `channel`
    pub epoch: u64,
    pub channel: Arc<dyn ServiceChannel>,
}

impl BoundService {
    pub fn is(&self, component: &ComponentName, user: UserId) -> bool {
        &self.component == component && self.user == user
    }

    /// The bind request this connection answers.
    pub fn request(&self, kind: BindingKind) -> BindRequest {
        BindRequest {
            component: self.component.clone(),
            user: self.user,
            kind,
            epoch: self.epoch,
        }
    }
}

/// The service currently receiving APDUs or frames.
#[derive(Clone, Debug)]
pub struct ActiveService {
    pub kind: BindingKind,
    pub service: BoundService,
}

/// Per-transaction binding.
#[derive(Debug, Default)]
pub struct SessionBinding {
    pub bound: Option<BoundService>,
    /// Bind started and not completed yet
    pub pending: Option<BindRequest>,
}

impl SessionBinding {
    pub fn is_pending(&self, component: &ComponentName, user: UserId) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| &p.component == component && p.user == user)
    }
}

/// Long-lived binding to the preferred payment service.
#[derive(Debug, Default)]
pub struct PaymentBinding {
    /// Last service a payment bind was requested for
    pub requested: Option<(UserId, ComponentName)>,
    /// Bind started and not yet unbound
    pub started: Option<BindRequest>,
    pub bound: Option<BoundService>,
    /// The last bind could not be started; try again on the next SELECT
    pub rebind_on_next_selection: bool,
}

/// Observe-mode bookkeeping around one-off transactions.
#[derive(Debug, Default)]
pub struct ObserveModeState {
    /// Observe mode was disabled for one transaction
    pub reenable_after_transaction: bool,
    /// An off-host SELECT happened; re-enable once the field drops
    pub reenable_on_field_off: bool,
    /// Packages whose foreground presence keeps observe mode on
    pub auto_disable_packages: Vec<String>,
}

/// Armed timers, one per kind. A firing whose token no longer matches was
/// cancelled or superseded.
#[derive(Debug, Default)]
pub struct TimerTable {
    armed: HashMap<TimerKind, (u64, AbortHandle)>,
    next_token: u64,
}

impl TimerTable {
    /// Reserve the token for a new `kind` timer.
    pub fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Remember a spawned timer, aborting the one it replaces.
    pub fn arm(&mut self, kind: TimerKind, token: u64, handle: AbortHandle) {
        if let Some((_, old)) = self.armed.insert(kind, (token, handle)) {
            old.abort();
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some((_, handle)) = self.armed.remove(&kind) {
            handle.abort();
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Disarm `kind` if `token` is its current token.
    pub fn take_if_current(&mut self, kind: TimerKind, token: u64) -> bool {
        match self.armed.get(&kind) {
            Some((armed, _)) if *armed == token => {
                self.armed.remove(&kind);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }
}

/// Everything the session mutates.
#[derive(Debug, Default)]
pub struct SessionState {
    pub state: EmulationState,
    pub polling_state: PollingLoopState,
    /// Last epoch handed to a bind request; a completion is current only
    /// while its request is still outstanding
    pub epoch: u64,
    pub cycle: CycleTracker,

    pub session_binding: SessionBinding,
    pub payment: PaymentBinding,
    pub active: Option<ActiveService>,
    /// Preferred payment service as last announced
    pub preferred_payment: Option<(UserId, ComponentName)>,

    /// SELECT waiting for its service's bind to complete
    pub pending_select: Option<(ComponentName, Vec<u8>)>,
    pub last_selected_aid: Option<String>,
    pub unroutable_aids: Vec<String>,

    pub filters: PollingFilterIndex,
    /// A/B/ON/OFF frames under evaluation
    pub pending_frames: Vec<PollingFrame>,
    /// Frames held for services that are still binding
    pub frames_to_send: HashMap<ComponentName, Vec<PollingFrame>>,
    /// Frames that arrived while a bind for buffered frames was in flight
    pub unprocessed_frames: Option<Vec<PollingFrame>>,

    pub observe: ObserveModeState,
    pub timers: TimerTable,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_active(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self, component: &ComponentName) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| &a.service.component == component)
    }

    /// Drop per-cycle buffers and go back to IDLE.
    pub fn return_to_idle(&mut self) {
        self.pending_frames.clear();
        self.frames_to_send.clear();
        self.unprocessed_frames = None;
        self.pending_select = None;
        self.reset_active();
        self.polling_state = PollingLoopState::Evaluating;
        self.state = EmulationState::Idle;
    }
}
