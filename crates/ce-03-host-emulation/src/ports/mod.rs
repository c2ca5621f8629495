//! Ports module for the Emulation Session

pub mod inbound;
pub mod outbound;

pub use inbound::HostEmulationApi;
pub use outbound::{
    BindRequest, BindingKind, DeviceState, DiagnosticsSink, RadioTransceiver, ServiceBinder,
    ServiceChannel, UserPrompts,
};
