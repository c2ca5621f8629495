//! Driving Ports (API - Inbound)

use crate::domain::EmulationState;
use crate::error::SessionResult;
use shared_types::{ComponentName, PollingFrame, UserId};

/// Primary Emulation Session API
///
/// Every call enqueues an event and returns at once; the session handles
/// events strictly in arrival order. `Err` only means the session has
/// shut down.
pub trait HostEmulationApi: Send + Sync {
    fn on_field_change_detected(&self, field_on: bool) -> SessionResult<()>;

    fn on_host_emulation_activated(&self) -> SessionResult<()>;

    fn on_host_emulation_data(&self, apdu: Vec<u8>) -> SessionResult<()>;

    fn on_host_emulation_deactivated(&self) -> SessionResult<()>;

    fn on_off_host_aid_selected(&self) -> SessionResult<()>;

    fn on_polling_loop_detected(&self, frames: Vec<PollingFrame>) -> SessionResult<()>;

    fn on_observe_mode_state_changed(&self, enabled: bool) -> SessionResult<()>;

    fn on_preferred_payment_service_changed(
        &self,
        user: UserId,
        component: Option<ComponentName>,
    ) -> SessionResult<()>;

    fn on_preferred_foreground_service_changed(
        &self,
        user: UserId,
        component: Option<ComponentName>,
    ) -> SessionResult<()>;

    /// Registered services changed; polling filters must be re-read.
    fn on_polling_loop_filters_changed(&self) -> SessionResult<()>;

    /// State after the last processed event.
    fn state(&self) -> EmulationState;

    fn is_host_card_emulation_activated(&self) -> bool {
        self.state().is_activated()
    }
}
