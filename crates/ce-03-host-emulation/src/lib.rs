//! # ce-03-host-emulation
//!
//! Emulation Session State Machine: receives field, activation, APDU and
//! polling-loop notifications from the controller and dispatches them to
//! card emulation services.
//!
//! ## Overview
//!
//! This component provides:
//! - **SELECT dispatch**: resolves the selected AID, applies the unlock,
//!   screen and on-host policy gates, binds the target service and forwards
//!   the command
//! - **Binding**: a per-transaction session binding plus a long-lived
//!   binding to the preferred payment service
//! - **Polling loop**: matches vendor frames against service filters,
//!   delivers standard frames to the preferred service and lifts observe
//!   mode for one transaction when needed
//! - **Outcomes**: classifies every activation cycle at deactivation
//!
//! ## Architecture
//!
//! ```text
//! NFCC ──radio events──→ SessionHandle ──queue──→ SessionDriver
//!                                                    │
//!                          Resolution (1) ←──resolve─┤
//!                          ServiceBinder  ←──bind────┤
//!                          ServiceChannel ←──APDUs───┤
//!                          Event Bus      ←──diagnostics
//! ```
//!
//! ## States
//!
//! ```text
//! IDLE ──activated──→ W4_SELECT ──SELECT, bound──→ XFER
//!  ↑ ↑                   │                          │
//!  │ │           SELECT, unbound                 deactivated
//!  │ │                   ↓                          │
//!  │ │              W4_SERVICE ──bound─────────────→┘
//!  │ │
//!  │ └──── field off timeout ── POLLING_LOOP ←── frames while IDLE
//!  └────── deactivated ──────── W4_DEACTIVATE ←── ambiguous SELECT
//! ```
//!
//! | State | Code | Activated |
//! |-------|------|-----------|
//! | IDLE | 0 | no |
//! | W4_SELECT | 1 | yes |
//! | W4_SERVICE | 2 | yes |
//! | XFER | 3 | yes |
//! | W4_DEACTIVATE | 4 | yes |
//! | POLLING_LOOP | 5 | no |
//!
//! ## Example
//!
//! ```rust,ignore
//! use ce_03_host_emulation::{HostEmulationApi, SessionConfig, SessionDriver};
//!
//! let (driver, handle) = SessionDriver::new(SessionConfig::default(), ports);
//! tokio::spawn(driver.run());
//!
//! handle.on_host_emulation_activated()?;
//! handle.on_host_emulation_data(select_apdu)?;
//! ```

pub mod domain;
pub mod driver;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod state;

pub use domain::{
    find_select_aid, select_apdu, CycleTracker, EmulationState, PollingFilterIndex,
    PollingLoopState,
};
pub use driver::{SessionDriver, SessionHandle};
pub use error::{SessionError, SessionResult};
pub use events::{SessionEvent, TimerKind};
pub use ports::inbound::HostEmulationApi;
pub use ports::outbound::{
    BindRequest, BindingKind, DeviceState, DiagnosticsSink, RadioTransceiver, ServiceBinder,
    ServiceChannel, UserPrompts,
};
pub use service::{HostEmulationSession, SessionConfig, SessionPorts};

#[cfg(test)]
mod testing;
