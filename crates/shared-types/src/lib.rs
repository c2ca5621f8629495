//! # Shared Types Crate
//!
//! This crate contains the domain entities shared by the card emulation
//! components: service descriptors, AID patterns, routing assignments and
//! polling-loop frames.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-component types are defined here.
//! - **Wholesale Snapshots**: A `CardEmulationService` is rebuilt whenever the
//!   registry reports a change; components never patch one in place.
//! - **Normalised AIDs**: Every `AidPattern` is uppercase hex, validated once
//!   at construction.

pub mod aid;
pub mod entities;
pub mod errors;
pub mod polling;
pub mod routing;

pub use aid::{is_valid_aid, AidMatchKind, AidPattern, MAX_AID_HEX_LEN, MIN_AID_HEX_LEN};
pub use entities::*;
pub use errors::*;
pub use polling::{PollingFrame, PollingFrameType};
pub use routing::{PowerState, RouteAssignment, RouteTarget};
