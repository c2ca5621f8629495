//! Domain logic for routing-table synthesis

pub mod matching;
pub mod options;
pub mod route;
pub mod synth;
pub mod table;

pub use matching::{AidMatchingMode, AID_TYPE_EXACT, AID_TYPE_PREFIX, AID_TYPE_SUBSET};
pub use options::{RouteOverrides, RoutingOptions};
pub use route::{RoutingDestination, SecureElementRoutes};
pub use synth::{synthesize, SynthesisParams};
pub use table::{RoutingDiff, RoutingRow, RoutingTable, CATCH_ALL_KEY};
