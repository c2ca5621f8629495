//! # Adapter Implementations
//!
//! Concrete implementations of the components' outbound ports:
//!
//! | Adapter | Ports |
//! |---------|-------|
//! | `SimulatedController` | ce-02 `RoutingController`, ce-03 `RadioTransceiver` |
//! | `StaticRegistry` | ce-01 `ServiceRegistry` |
//! | `LoopbackBinder` / `LoopbackChannel` | ce-03 `ServiceBinder`, `ServiceChannel` |
//! | `StaticDeviceState` / `LoggingPrompts` | ce-03 `DeviceState`, `UserPrompts` |
//! | `BusDiagnostics` | ce-02 and ce-03 `DiagnosticsSink` |
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 OUTER LAYER (Adapters)                    │
//! │   SimulatedController, LoopbackBinder, BusDiagnostics     │
//! └───────────────────────────────────────────────────────────┘
//!                         ↑ implements ↑
//! ┌───────────────────────────────────────────────────────────┐
//! │              MIDDLE LAYER (Ports, per component)          │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod controller;
pub mod device;
pub mod diagnostics;
pub mod registry;
pub mod services;

pub use controller::{ControllerCapabilities, ProgrammedRoute, SimulatedController};
pub use device::{LoggingPrompts, PromptRecord, StaticDeviceState};
pub use diagnostics::{topic_label, BusDiagnostics};
pub use registry::StaticRegistry;
pub use services::{LoopbackBinder, LoopbackChannel, DEFAULT_RESPONSE};
