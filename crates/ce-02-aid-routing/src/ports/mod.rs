//! Ports module for the Routing Table Synthesizer

pub mod inbound;
pub mod outbound;

pub use inbound::AidRoutingApi;
pub use outbound::{DiagnosticsSink, RoutingController};
