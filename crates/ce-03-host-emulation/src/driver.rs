//! Session driver and handle
//!
//! The driver owns the session and drains its queue on one task. Handles
//! are cheap to clone and only enqueue, so radio and binder callbacks never
//! block on session work.

use crate::domain::EmulationState;
use crate::error::{SessionError, SessionResult};
use crate::events::SessionEvent;
use crate::ports::inbound::HostEmulationApi;
use crate::service::{HostEmulationSession, SessionConfig, SessionPorts};
use shared_types::{ComponentName, PollingFrame, UserId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Enqueue side of the session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    state_rx: watch::Receiver<EmulationState>,
}

impl SessionHandle {
    /// Enqueue any session event. Adapters use this for bind completions
    /// and service replies.
    pub fn send(&self, event: SessionEvent) -> SessionResult<()> {
        self.tx.send(event).map_err(|_| SessionError::QueueClosed)
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<EmulationState> {
        self.state_rx.clone()
    }
}

impl HostEmulationApi for SessionHandle {
    fn on_field_change_detected(&self, field_on: bool) -> SessionResult<()> {
        self.send(SessionEvent::FieldChanged { on: field_on })
    }

    fn on_host_emulation_activated(&self) -> SessionResult<()> {
        self.send(SessionEvent::Activated)
    }

    fn on_host_emulation_data(&self, apdu: Vec<u8>) -> SessionResult<()> {
        self.send(SessionEvent::Data { apdu })
    }

    fn on_host_emulation_deactivated(&self) -> SessionResult<()> {
        self.send(SessionEvent::Deactivated)
    }

    fn on_off_host_aid_selected(&self) -> SessionResult<()> {
        self.send(SessionEvent::OffHostAidSelected)
    }

    fn on_polling_loop_detected(&self, frames: Vec<PollingFrame>) -> SessionResult<()> {
        self.send(SessionEvent::PollingLoop { frames })
    }

    fn on_observe_mode_state_changed(&self, enabled: bool) -> SessionResult<()> {
        self.send(SessionEvent::ObserveModeChanged { enabled })
    }

    fn on_preferred_payment_service_changed(
        &self,
        user: UserId,
        component: Option<ComponentName>,
    ) -> SessionResult<()> {
        self.send(SessionEvent::PreferredPaymentChanged { user, component })
    }

    fn on_preferred_foreground_service_changed(
        &self,
        user: UserId,
        component: Option<ComponentName>,
    ) -> SessionResult<()> {
        self.send(SessionEvent::PreferredForegroundChanged { user, component })
    }

    fn on_polling_loop_filters_changed(&self) -> SessionResult<()> {
        self.send(SessionEvent::PollingFiltersChanged)
    }

    fn state(&self) -> EmulationState {
        *self.state_rx.borrow()
    }
}

/// Owns the session and its queue.
pub struct SessionDriver {
    session: HostEmulationSession,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionDriver {
    pub fn new(config: SessionConfig, ports: SessionPorts) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EmulationState::Idle);
        let session = HostEmulationSession::new(config, ports, tx.downgrade(), state_tx);
        (Self { session, rx }, SessionHandle { tx, state_rx })
    }

    /// Handle events until every handle is dropped.
    pub async fn run(mut self) {
        info!("Emulation session started");
        while let Some(event) = self.rx.recv().await {
            self.session.handle(event).await;
        }
        self.session.shutdown();
        info!("Emulation session stopped");
    }

    /// Handle whatever is queued right now. Returns the number of events
    /// handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.session.handle(event).await;
            handled += 1;
        }
        if handled > 0 {
            debug!(handled, "Drained session queue");
        }
        handled
    }

    pub fn session(&self) -> &HostEmulationSession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_state_published_after_each_event() {
        let mut h = Harness::new(Vec::new());
        let mut state_rx = h.handle.subscribe_state();
        assert_eq!(h.handle.state(), EmulationState::Idle);

        h.handle.on_host_emulation_activated().unwrap();
        assert_eq!(h.driver.drain().await, 1);
        assert!(state_rx.has_changed().unwrap());
        assert_eq!(*state_rx.borrow_and_update(), EmulationState::WaitForSelect);
        assert!(h.handle.is_host_card_emulation_activated());
    }

    #[tokio::test]
    async fn test_run_stops_when_handles_dropped() {
        let h = Harness::new(Vec::new());
        let Harness { driver, handle, .. } = h;
        let sender = handle.clone();
        sender.on_host_emulation_activated().unwrap();
        let task = tokio::spawn(driver.run());

        drop(handle);
        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let Harness { driver, handle, .. } = Harness::new(Vec::new());
        drop(driver);
        assert!(matches!(
            handle.on_field_change_detected(true),
            Err(SessionError::QueueClosed)
        ));
    }
}
