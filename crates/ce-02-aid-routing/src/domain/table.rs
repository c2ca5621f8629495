//! Routing table rows, sizing and diffing

use crate::domain::route::RoutingDestination;
use serde::{Deserialize, Serialize};
use shared_types::PowerState;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Key of the empty catch-all row.
pub const CATCH_ALL_KEY: &str = "";

/// Fixed per-row overhead in the controller table, in bytes.
pub const ROW_OVERHEAD_BYTES: usize = 4;

/// One programmed row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRow {
    /// Pattern text with marker; empty for the catch-all row
    pub key: String,
    /// AID string handed to the controller
    pub aid: String,
    pub route: RoutingDestination,
    pub power_state: PowerState,
    pub aid_type: u8,
}

impl RoutingRow {
    pub fn is_catch_all(&self) -> bool {
        self.key == CATCH_ALL_KEY
    }

    /// Serialized size of this row.
    pub fn size_bytes(&self) -> usize {
        self.aid.trim_end_matches(&['*', '#'][..]).len() / 2 + ROW_OVERHEAD_BYTES
    }
}

/// A whole routing table keyed by pattern text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    rows: BTreeMap<String, RoutingRow>,
}

/// Controller operations turning one table into another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingDiff {
    /// Controller AID strings to unroute
    pub unroute: Vec<String>,
    /// Rows to route, catch-all first, then longer AIDs before shorter
    pub route: Vec<RoutingRow>,
}

impl RoutingDiff {
    pub fn is_empty(&self) -> bool {
        self.unroute.is_empty() && self.route.is_empty()
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: RoutingRow) {
        self.rows.insert(row.key.clone(), row);
    }

    pub fn get(&self, key: &str) -> Option<&RoutingRow> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = &RoutingRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Serialized size: sum of `len(aid)/2 + 4` over every row.
    pub fn size_bytes(&self) -> usize {
        self.rows.values().map(RoutingRow::size_bytes).sum()
    }

    /// Operations that turn `self` (committed) into `desired`.
    pub fn diff(&self, desired: &RoutingTable) -> RoutingDiff {
        let unroute = self
            .rows
            .values()
            .filter(|row| desired.rows.get(&row.key) != Some(*row))
            .map(|row| row.aid.clone())
            .collect();

        let route = ordered(
            desired
                .rows
                .values()
                .filter(|row| self.rows.get(&row.key) != Some(*row))
                .cloned()
                .collect(),
        );

        RoutingDiff { unroute, route }
    }

    /// Every row in programming order.
    pub fn programming_order(&self) -> Vec<RoutingRow> {
        ordered(self.rows.values().cloned().collect())
    }
}

fn ordered(mut rows: Vec<RoutingRow>) -> Vec<RoutingRow> {
    rows.sort_by_key(|row| (!row.is_catch_all(), Reverse(row.aid.len()), row.key.clone()));
    rows
}
