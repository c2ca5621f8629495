use crate::domain::{RoutingOptions, RoutingTable};

/// Synthesizer state, mutated only under the service's lock.
pub struct RoutingState {
    /// Default routes and overrides
    pub options: RoutingOptions,
    /// What the controller currently holds
    pub committed: RoutingTable,
    /// Successful commits since start
    pub commits: u64,
}

impl RoutingState {
    pub fn new(options: RoutingOptions) -> Self {
        Self {
            options,
            committed: RoutingTable::new(),
            commits: 0,
        }
    }
}
