//! # Component Wiring
//!
//! Long-running tasks that connect the components:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       NFC STACK WIRING                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  MaintenanceEvent ──→ [maintenance] ──→ Resolution (1)       │
//! │                            │                 │               │
//! │                            │    routing_assignments          │
//! │                            ↓                 ↓               │
//! │                       Session (3)       Routing (2)          │
//! │                            │                 │               │
//! │                            └──diagnostics────┴──→ EVENT BUS  │
//! │                                                   │          │
//! │                                  [diagnostics_log]←┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod diagnostics_log;
pub mod maintenance;

pub use diagnostics_log::{log_diagnostic, run_diagnostics_log};
pub use maintenance::{MaintenanceCoordinator, MaintenanceEvent};
