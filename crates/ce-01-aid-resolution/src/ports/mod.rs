//! Ports module for the AID Resolution Engine

pub mod inbound;
pub mod outbound;

pub use inbound::{AidResolutionApi, RegisteredPollingFilter};
pub use outbound::ServiceRegistry;
