//! Default routes and their temporary overrides

use crate::domain::route::RoutingDestination;
use serde::{Deserialize, Serialize};

/// Route overrides set by a foreground app. `None` means "not overridden".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOverrides {
    pub default_route: Option<RoutingDestination>,
    pub iso_dep_route: Option<RoutingDestination>,
    pub offhost_route: Option<RoutingDestination>,
}

/// Default routes used when synthesizing a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOptions {
    /// Where AIDs with no explicit row go
    pub default_route: RoutingDestination,
    /// Where ISO-DEP traffic with no AID match goes
    pub default_iso_dep_route: RoutingDestination,
    /// Route for off-host services whose secure element is unknown
    pub default_offhost_route: RoutingDestination,
    /// Retry an overflowing table with the default route moved off-host
    pub auto_change_enabled: bool,
    pub overrides: RouteOverrides,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            default_route: RoutingDestination::HOST,
            default_iso_dep_route: RoutingDestination::HOST,
            default_offhost_route: RoutingDestination::HOST,
            auto_change_enabled: true,
            overrides: RouteOverrides::default(),
        }
    }
}

impl RoutingOptions {
    pub fn effective_default_route(&self) -> RoutingDestination {
        self.overrides.default_route.unwrap_or(self.default_route)
    }

    pub fn effective_iso_dep_route(&self) -> RoutingDestination {
        self.overrides
            .iso_dep_route
            .unwrap_or(self.default_iso_dep_route)
    }

    pub fn effective_offhost_route(&self) -> RoutingDestination {
        self.overrides
            .offhost_route
            .unwrap_or(self.default_offhost_route)
    }

    pub fn is_routing_table_overridden(&self) -> bool {
        self.overrides != RouteOverrides::default()
    }

    pub fn override_default_route(&mut self, route: RoutingDestination) {
        self.overrides.default_route = Some(route);
    }

    pub fn override_default_iso_dep_route(&mut self, route: RoutingDestination) {
        self.overrides.iso_dep_route = Some(route);
    }

    pub fn override_default_offhost_route(&mut self, route: RoutingDestination) {
        self.overrides.offhost_route = Some(route);
    }

    /// Drop every override.
    pub fn recover_override(&mut self) {
        self.overrides = RouteOverrides::default();
    }

    /// Copy with the default route moved to the default off-host route.
    pub fn with_offhost_default(&self) -> Self {
        let mut options = self.clone();
        options.overrides.default_route = Some(self.effective_offhost_route());
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_and_recover() {
        let mut options = RoutingOptions {
            default_offhost_route: RoutingDestination(0x81),
            ..Default::default()
        };
        assert!(!options.is_routing_table_overridden());

        options.override_default_route(RoutingDestination(0x86));
        options.override_default_iso_dep_route(RoutingDestination(0x86));
        assert!(options.is_routing_table_overridden());
        assert_eq!(options.effective_default_route(), RoutingDestination(0x86));
        assert_eq!(options.effective_offhost_route(), RoutingDestination(0x81));

        options.recover_override();
        assert!(!options.is_routing_table_overridden());
        assert_eq!(options.effective_default_route(), RoutingDestination::HOST);
    }

    #[test]
    fn test_offhost_default() {
        let options = RoutingOptions {
            default_offhost_route: RoutingDestination(0x81),
            ..Default::default()
        };
        let moved = options.with_offhost_default();
        assert_eq!(moved.effective_default_route(), RoutingDestination(0x81));
        assert_eq!(moved.effective_iso_dep_route(), RoutingDestination::HOST);
    }
}
