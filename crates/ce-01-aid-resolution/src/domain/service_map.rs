//! Filtered registration index for one user's services
//!
//! Built once per service-set change. Registrations the controller cannot
//! express are dropped here, as are exact registrations already covered by
//! a prefix or subset registration of the same service.

use crate::domain::resolution::MatchedCandidate;
use crate::error::ResolutionError;
use shared_types::{AidPattern, AidRegistration, CardEmulationService};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Controller matching capabilities relevant to registration filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub prefix_matching: bool,
    pub subset_matching: bool,
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self {
            prefix_matching: true,
            subset_matching: false,
        }
    }
}

/// One service with the registrations that survived filtering.
#[derive(Clone, Debug)]
struct IndexedService {
    service: Arc<CardEmulationService>,
    registrations: Vec<AidRegistration>,
}

/// Registration index in service declaration order.
#[derive(Clone, Debug, Default)]
pub struct AidServiceMap {
    entries: Vec<IndexedService>,
    patterns: BTreeSet<AidPattern>,
    skipped: usize,
}

impl AidServiceMap {
    /// Build the index. Declaration order of `services` is preserved and is
    /// the tie-break order for every later decision.
    pub fn build(services: &[Arc<CardEmulationService>], caps: CapabilityFlags) -> Self {
        let mut map = AidServiceMap::default();

        for service in services {
            let accepted = filter_registrations(service, caps, &mut map.skipped);
            for registration in &accepted {
                map.patterns.insert(registration.pattern.clone());
            }
            map.entries.push(IndexedService {
                service: service.clone(),
                registrations: accepted,
            });
        }

        map
    }

    /// Services in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &Arc<CardEmulationService>> {
        self.entries.iter().map(|e| &e.service)
    }

    /// Every distinct registered pattern.
    pub fn patterns(&self) -> impl Iterator<Item = &AidPattern> {
        self.patterns.iter()
    }

    /// Registrations dropped while building.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Candidates for a concrete AID: each service contributes its most
    /// specific matching registration, at most once.
    pub fn candidates_for_aid(&self, aid: &str) -> Vec<MatchedCandidate> {
        self.collect(|registration| registration.pattern.matches(aid))
    }

    /// Candidates for a registered pattern: services that registered the
    /// pattern itself or one that covers it.
    pub fn candidates_for_pattern(&self, pattern: &AidPattern) -> Vec<MatchedCandidate> {
        self.collect(|registration| registration.pattern.covers(pattern))
    }

    fn collect<F>(&self, mut accept: F) -> Vec<MatchedCandidate>
    where
        F: FnMut(&AidRegistration) -> bool,
    {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .registrations
                    .iter()
                    .filter(|r| accept(r))
                    .max_by_key(|r| r.pattern.specificity())
                    .map(|r| MatchedCandidate {
                        service: entry.service.clone(),
                        pattern: r.pattern.clone(),
                        category: r.category,
                    })
            })
            .collect()
    }
}

fn filter_registrations(
    service: &CardEmulationService,
    caps: CapabilityFlags,
    skipped: &mut usize,
) -> Vec<AidRegistration> {
    let supported: Vec<&AidRegistration> = service
        .registrations
        .iter()
        .filter(|r| {
            let mode = if r.pattern.is_prefix() && !caps.prefix_matching {
                Some("prefix")
            } else if r.pattern.is_subset() && !caps.subset_matching {
                Some("subset")
            } else {
                None
            };
            match mode {
                Some(mode) => {
                    let err = ResolutionError::UnsupportedMatching {
                        pattern: r.pattern.to_string(),
                        mode,
                    };
                    debug!(component = %service.component, error = %err, "Skipping registration");
                    *skipped += 1;
                    false
                }
                None => true,
            }
        })
        .collect();

    let mut accepted: Vec<AidRegistration> = Vec::with_capacity(supported.len());
    for registration in &supported {
        if registration.pattern.is_exact()
            && supported
                .iter()
                .any(|other| !other.pattern.is_exact() && other.pattern.covers(&registration.pattern))
        {
            debug!(
                component = %service.component,
                aid = %registration.pattern,
                "Exact registration covered by a wider one"
            );
            *skipped += 1;
            continue;
        }
        if accepted.iter().any(|a| a.pattern == registration.pattern) {
            continue;
        }
        accepted.push((*registration).clone());
    }
    accepted
}
