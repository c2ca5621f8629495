//! # ce-01-aid-resolution
//!
//! AID Resolution Engine: decides, per AID, which installed card emulation
//! service is the authoritative default and which others are eligible.
//!
//! ## Overview
//!
//! This component provides:
//! - **Resolution**: `resolve(aid)` returns a tagged `AidResolution`
//!   (`Default`, `Ambiguous` or `None`)
//! - **Conflict Rules**: category, wallet-role ownership and foreground preference
//! - **Routing Assignments**: the host/off-host placement and power state of
//!   every registered pattern, consumed by the routing synthesizer
//! - **Pure Queries**: no I/O; the cache is dropped wholesale on any input change
//!
//! ## Architecture
//!
//! ```text
//! Service Registry ──services──→ Resolution (1) ←──resolve(aid)── Session (3)
//!                                     │
//!  wallet role / foreground / nfc ───→│
//!                                     └── routing_assignments() ──→ Routing (2)
//! ```
//!
//! ## Conflict Rules
//!
//! | Category | Radio routing | Tie-break |
//! |----------|---------------|-----------|
//! | PAYMENT | active | wallet-role holder's first-declared candidate |
//! | PAYMENT | inactive | foreground-preferred service, if a candidate |
//! | any | any | single surviving candidate |
//! | any | any | otherwise ambiguous (user disambiguation) |
//!
//! ## Example
//!
//! ```rust,ignore
//! use ce_01_aid_resolution::{AidResolutionApi, AidResolutionService, ResolutionConfig};
//!
//! let engine = AidResolutionService::new(ResolutionConfig::default(), registry);
//! engine.on_services_updated(0, services);
//! engine.on_nfc_enabled();
//!
//! match engine.resolve("A0000000041010") {
//!     AidResolution::Default { service, .. } => dispatch(service),
//!     AidResolution::Ambiguous { candidates, .. } => show_chooser(candidates),
//!     AidResolution::None => reply_not_found(),
//! }
//! ```

pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod state;

pub use domain::{
    compute_aid_power_state, resolve_conflict, route_assignment, AidResolution, AidServiceMap,
    CapabilityFlags, ConflictContext, MatchedCandidate,
};
pub use error::{ResolutionError, ResolutionResult};
pub use ports::inbound::{AidResolutionApi, RegisteredPollingFilter};
pub use ports::outbound::ServiceRegistry;
pub use service::{AidResolutionService, ResolutionConfig};
