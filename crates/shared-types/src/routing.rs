//! # Routing Assignments
//!
//! The contract between the AID Resolution Engine and the Routing Table
//! Synthesizer: where each AID pattern should be routed and in which
//! power states the route is active.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Controller power-state bitmask for a routing entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PowerState(pub u8);

impl PowerState {
    pub const SWITCH_ON: PowerState = PowerState(0x01);
    pub const SWITCH_OFF: PowerState = PowerState(0x02);
    pub const BATTERY_OFF: PowerState = PowerState(0x04);
    pub const SCREEN_OFF_UNLOCKED: PowerState = PowerState(0x08);
    pub const SCREEN_ON_LOCKED: PowerState = PowerState(0x10);
    pub const SCREEN_OFF_LOCKED: PowerState = PowerState(0x20);

    /// Every power state.
    pub const ALL: PowerState = PowerState(0x3F);

    /// Power states understood by NCI 1.x controllers.
    pub const NCI_V1_ALL: PowerState = PowerState(0x07);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: PowerState) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PowerState {
    type Output = PowerState;

    fn bitor(self, rhs: Self) -> Self::Output {
        PowerState(self.0 | rhs.0)
    }
}

impl BitAnd for PowerState {
    type Output = PowerState;

    fn bitand(self, rhs: Self) -> Self::Output {
        PowerState(self.0 & rhs.0)
    }
}

impl Not for PowerState {
    type Output = PowerState;

    fn not(self) -> Self::Output {
        PowerState(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Logical destination of an AID before it is mapped to a controller route id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteTarget {
    /// The host execution environment.
    Host,
    /// A named secure element (`eSE1`, `SIM2`, ...).
    OffHost { secure_element: String },
}

impl RouteTarget {
    pub fn is_host(&self) -> bool {
        matches!(self, RouteTarget::Host)
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Host => write!(f, "host"),
            RouteTarget::OffHost { secure_element } => write!(f, "{secure_element}"),
        }
    }
}

/// Desired routing of one AID pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAssignment {
    pub target: RouteTarget,
    pub power_state: PowerState,
}

impl RouteAssignment {
    pub fn new(target: RouteTarget, power_state: PowerState) -> Self {
        Self {
            target,
            power_state,
        }
    }
}
