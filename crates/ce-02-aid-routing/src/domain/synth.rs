//! Desired-table synthesis
//!
//! Turns resolved AID assignments into the rows the controller must hold:
//!
//! 1. Each assignment is mapped to a route id (host, or the configured
//!    secure element, else the default off-host route).
//! 2. Rows that land on the default route are left to the controller's
//!    default, except in prefix-only mode when a shorter AID on another
//!    route would shadow them.
//! 3. A catch-all row is added when ISO-DEP defaults to the host.

use crate::domain::matching::AidMatchingMode;
use crate::domain::options::RoutingOptions;
use crate::domain::route::{RoutingDestination, SecureElementRoutes};
use crate::domain::table::{RoutingRow, RoutingTable, CATCH_ALL_KEY};
use shared_types::{AidPattern, PowerState, RouteAssignment};
use std::collections::BTreeMap;

/// Everything synthesis reads besides the assignments.
#[derive(Clone, Copy, Debug)]
pub struct SynthesisParams<'a> {
    pub options: &'a RoutingOptions,
    pub secure_elements: &'a SecureElementRoutes,
    pub mode: AidMatchingMode,
    pub nci_version_2: bool,
}

/// Build the desired table for `assignments`.
pub fn synthesize(
    assignments: &BTreeMap<AidPattern, RouteAssignment>,
    params: &SynthesisParams<'_>,
) -> RoutingTable {
    let default_route = params.options.effective_default_route();
    let offhost_route = params.options.effective_offhost_route();

    let resolved: Vec<(&AidPattern, RoutingDestination, PowerState)> = assignments
        .iter()
        .map(|(pattern, assignment)| {
            let route = params
                .secure_elements
                .destination_for(&assignment.target, offhost_route);
            (pattern, route, assignment.power_state)
        })
        .collect();

    let mut table = RoutingTable::new();

    for (pattern, route, power_state) in &resolved {
        if *route == default_route
            && !(params.mode == AidMatchingMode::PrefixOnly && is_shadowed(pattern, default_route, &resolved))
        {
            continue;
        }
        let (aid, aid_type) = params.mode.encode(pattern);
        table.insert(RoutingRow {
            key: pattern.to_string(),
            aid,
            route: *route,
            power_state: *power_state,
            aid_type,
        });
    }

    if params.options.effective_iso_dep_route().is_host() {
        table.insert(RoutingRow {
            key: CATCH_ALL_KEY.to_string(),
            aid: String::new(),
            route: default_route,
            power_state: default_power_state(default_route, params.nci_version_2),
            aid_type: params.mode.catch_all_flags(),
        });
    }

    table
}

/// A default-route pattern is shadowed when a shorter pattern on another
/// route is a prefix of it.
fn is_shadowed(
    pattern: &AidPattern,
    default_route: RoutingDestination,
    resolved: &[(&AidPattern, RoutingDestination, PowerState)],
) -> bool {
    resolved.iter().any(|(other, route, _)| {
        *route != default_route
            && other.body().len() < pattern.body().len()
            && pattern.body().starts_with(other.body())
    })
}

fn default_power_state(route: RoutingDestination, nci_version_2: bool) -> PowerState {
    match (nci_version_2, route.is_host()) {
        (true, true) => PowerState::ALL & !(PowerState::SWITCH_OFF | PowerState::BATTERY_OFF),
        (true, false) => PowerState::ALL & !PowerState::BATTERY_OFF,
        (false, true) => PowerState::SWITCH_ON,
        (false, false) => PowerState::NCI_V1_ALL,
    }
}
