//! Session states

use std::fmt;

/// Emulation session state.
///
/// ```text
///            activated                SELECT, bound
///   IDLE ───────────────→ W4_SELECT ───────────────→ XFER
///    ↑  ↘ frames              │  ↑ bind completes      │
///    │   POLLING_LOOP         │  └──── W4_SERVICE ←────┤ SELECT, unbound
///    │                        └ ambiguous → W4_DEACTIVATE
///    └───────── deactivated / idle timer ──────────────┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EmulationState {
    #[default]
    Idle,
    WaitForSelect,
    WaitForService,
    Xfer,
    WaitForDeactivate,
    PollingLoop,
}

impl EmulationState {
    /// A reader has activated the host in this cycle.
    pub fn is_activated(self) -> bool {
        !matches!(self, EmulationState::Idle | EmulationState::PollingLoop)
    }

    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            EmulationState::Idle => "idle",
            EmulationState::WaitForSelect => "w4_select",
            EmulationState::WaitForService => "w4_service",
            EmulationState::Xfer => "xfer",
            EmulationState::WaitForDeactivate => "w4_deactivate",
            EmulationState::PollingLoop => "polling_loop",
        }
    }

    /// Numeric code exported on the state gauge.
    pub fn code(self) -> i64 {
        match self {
            EmulationState::Idle => 0,
            EmulationState::WaitForSelect => 1,
            EmulationState::WaitForService => 2,
            EmulationState::Xfer => 3,
            EmulationState::WaitForDeactivate => 4,
            EmulationState::PollingLoop => 5,
        }
    }
}

impl fmt::Display for EmulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How unmatched polling frames are being handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollingLoopState {
    /// Collecting A/B/ON/OFF frames until the loop looks like a reader.
    #[default]
    Evaluating,
    /// A service filter claimed a frame.
    FilterMatched,
    /// Pending frames go to the preferred service.
    DeliveringToPreferred,
}
