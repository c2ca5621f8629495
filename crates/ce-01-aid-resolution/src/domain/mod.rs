//! Domain logic for AID resolution
//!
//! Everything here is pure: no locks, no I/O, no clocks.

pub mod assignment;
pub mod conflict;
pub mod power;
pub mod resolution;
pub mod service_map;

pub use assignment::route_assignment;
pub use conflict::{resolve_conflict, ConflictContext};
pub use power::compute_aid_power_state;
pub use resolution::{AidResolution, MatchedCandidate};
pub use service_map::{AidServiceMap, CapabilityFlags};
