//! # Cross-Component Integration
//!
//! | Module | Components | Driven through |
//! |--------|------------|----------------|
//! | `resolution_routing` | ce-01, ce-02 | `routing_assignments()` → `configure_routing()` |
//! | `session_scenarios` | ce-01, ce-03 | `SessionHandle` radio events, drained by the test |

pub mod fixtures;
pub mod resolution_routing;
pub mod session_scenarios;
