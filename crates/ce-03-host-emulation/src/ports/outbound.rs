//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Everything the session reaches outside itself: the radio, the platform
//! binder, bound service processes, UI surfaces, device state and
//! diagnostics. Bind completions and service replies come back as
//! [`SessionEvent`](crate::events::SessionEvent)s on the session queue.

use crate::error::SessionResult;
use async_trait::async_trait;
use shared_bus::CardEmulationEvent;
use shared_types::{
    CardEmulationService, Category, ComponentName, DeactivationReason, PollingFrame, UserId,
};
use std::fmt;
use std::sync::Arc;

/// Which binding slot a bind belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Per-transaction binding, dropped at deactivation.
    Session,
    /// Long-lived binding to the preferred payment service.
    Payment,
}

/// A bind the platform should start. `epoch` is unique per request and the
/// completion carries it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindRequest {
    pub component: ComponentName,
    pub user: UserId,
    pub kind: BindingKind,
    pub epoch: u64,
}

/// NFC controller data path
#[async_trait]
pub trait RadioTransceiver: Send + Sync {
    /// Send a response APDU to the reader.
    async fn send_response(&self, apdu: &[u8]) -> SessionResult<()>;

    /// Switch observe mode on or off.
    async fn set_observe_mode(&self, enabled: bool) -> SessionResult<()>;

    fn is_observe_mode_enabled(&self) -> bool;
}

/// Platform service binding
///
/// `bind` only starts the bind; success arrives later as a
/// `ServiceBound` event. An `Err` means the bind could not be started.
#[async_trait]
pub trait ServiceBinder: Send + Sync {
    async fn bind(&self, request: BindRequest) -> SessionResult<()>;

    /// Release the connection started by `request`. Other binds of the same
    /// component stay up.
    async fn unbind(&self, request: &BindRequest);
}

/// Command channel to one bound service process
#[async_trait]
pub trait ServiceChannel: Send + Sync + fmt::Debug {
    async fn send_command_apdu(&self, apdu: &[u8]) -> SessionResult<()>;

    async fn send_deactivated(&self, reason: DeactivationReason) -> SessionResult<()>;

    async fn send_polling_frames(&self, frames: &[PollingFrame]) -> SessionResult<()>;
}

/// User-facing surfaces
pub trait UserPrompts: Send + Sync {
    /// Let the user pick among `candidates`.
    fn show_chooser(
        &self,
        candidates: &[Arc<CardEmulationService>],
        failed_component: Option<&ComponentName>,
        category: Category,
    );

    /// Ask the user to unlock and tap again for `service`.
    fn show_tap_again(&self, service: &CardEmulationService, category: Category);

    fn dismiss_tap_again(&self);

    /// Bring up the keyguard unlock prompt.
    fn request_unlock(&self);
}

/// Device state read at decision time
pub trait DeviceState: Send + Sync {
    fn is_keyguard_locked(&self) -> bool;

    fn is_screen_on(&self) -> bool;

    fn is_secure_nfc_enabled(&self) -> bool;

    /// Packages with a foreground process.
    fn foreground_packages(&self) -> Vec<String>;
}

/// Fire-and-forget diagnostics
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: CardEmulationEvent);
}
