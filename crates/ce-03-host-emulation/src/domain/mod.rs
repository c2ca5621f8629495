//! Pure session logic: APDU parsing, states, outcome tracking and
//! polling-loop matching.

pub mod apdu;
pub mod outcome;
pub mod polling;
pub mod state;

pub use apdu::{find_select_aid, is_ndef_aid, select_apdu};
pub use outcome::CycleTracker;
pub use polling::{
    break_tie, should_deliver_pending, FilterMatch, PollingFilterIndex, TieBreakContext,
};
pub use state::{EmulationState, PollingLoopState};
