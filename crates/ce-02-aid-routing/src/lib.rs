//! # ce-02-aid-routing
//!
//! Routing Table Synthesizer: turns the resolution engine's per-pattern
//! assignments into the minimal set of controller route/unroute calls and
//! commits them.
//!
//! ## Overview
//!
//! This component provides:
//! - **Synthesis**: maps host/off-host targets to route ids, skips rows the
//!   controller default already covers, adds the catch-all row
//! - **Encoding**: strips `*`/`#` markers and sets type flags when the
//!   controller matches prefixes or subsets natively
//! - **Diffing**: unroutes stale rows, routes new ones, commits once
//! - **Capacity**: retries with an off-host default, commits oversize tables
//!   on NCI 2.0, otherwise keeps the previous table and reports an overflow
//!
//! ## Architecture
//!
//! ```text
//! Resolution (1) ──routing_assignments()──→ Routing (2) ──route/unroute/commit──→ NFCC
//!                                                │
//!                                                └── diagnostics ──→ Event Bus
//! ```
//!
//! ## Matching Modes
//!
//! | Mode | Value | Prefix | Subset |
//! |------|-------|--------|--------|
//! | EXACT_ONLY | 0 | no | no |
//! | EXACT_OR_PREFIX | 1 | yes | no |
//! | PREFIX_ONLY | 2 | yes (every row) | no |
//! | EXACT_OR_SUBSET_OR_PREFIX | 3 | yes | yes |
//!
//! ## Example
//!
//! ```rust,ignore
//! use ce_02_aid_routing::{AidRoutingApi, AidRoutingService, RoutingConfig};
//!
//! let routing = AidRoutingService::new(RoutingConfig::default(), controller, diagnostics);
//! let changed = routing
//!     .configure_routing(&engine.routing_assignments(), false)
//!     .await;
//! ```

pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod state;

pub use domain::{
    AidMatchingMode, RoutingDestination, RoutingDiff, RoutingOptions, RoutingRow, RoutingTable,
    SecureElementRoutes,
};
pub use error::{RoutingError, RoutingResult};
pub use ports::inbound::AidRoutingApi;
pub use ports::outbound::{DiagnosticsSink, RoutingController, NCI_VERSION_2_0};
pub use service::{AidRoutingService, RoutingConfig};
