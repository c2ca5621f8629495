//! Conflict resolution between candidates for one AID
//!
//! ## Rules (in order)
//!
//! 1. OTHER candidates of services with category OTHER disabled are dropped.
//! 2. The resolution is PAYMENT if any survivor claims PAYMENT.
//! 3. PAYMENT, radio routing active, wallet holder owns a survivor: the
//!    holder's first-declared survivor wins. Non-wallet PAYMENT claimers
//!    leave the candidate list.
//! 4. PAYMENT, radio routing inactive, foreground service is a survivor:
//!    the foreground service wins.
//! 5. A single survivor wins. Anything else is ambiguous.

use crate::domain::resolution::{AidResolution, MatchedCandidate};
use shared_types::{CardEmulationService, Category, ComponentName};
use std::sync::Arc;

/// Inputs to tie-breaking that are not part of the candidate list.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConflictContext<'a> {
    /// Package currently holding the wallet role for the active user.
    pub wallet_holder: Option<&'a str>,
    /// Foreground-preferred service for the active user.
    pub foreground: Option<&'a ComponentName>,
    /// Hardware routing is programmed (NFC fully enabled).
    pub radio_routing_active: bool,
    /// Promote a lone survivor to default.
    pub single_service_default: bool,
}

/// Apply the conflict rules to candidates given in declaration order.
pub fn resolve_conflict(candidates: Vec<MatchedCandidate>, ctx: &ConflictContext<'_>) -> AidResolution {
    let survivors: Vec<MatchedCandidate> = candidates
        .into_iter()
        .filter(|c| c.category != Category::Other || c.service.category_other_enabled)
        .collect();

    if survivors.is_empty() {
        return AidResolution::None;
    }

    let category = if survivors.iter().any(|c| c.category == Category::Payment) {
        Category::Payment
    } else {
        Category::Other
    };

    if category == Category::Payment {
        if ctx.radio_routing_active {
            if let Some(holder) = ctx.wallet_holder {
                if let Some(owned) = survivors.iter().find(|c| c.service.package() == holder) {
                    let service = owned.service.clone();
                    let candidates = survivors
                        .iter()
                        .filter(|c| c.service.package() == holder || c.category != Category::Payment)
                        .map(|c| c.service.clone())
                        .collect();
                    return AidResolution::Default {
                        service,
                        candidates,
                        category,
                    };
                }
            }
        } else if let Some(foreground) = ctx.foreground {
            if let Some(fg) = survivors.iter().find(|c| c.component() == foreground) {
                let service = fg.service.clone();
                return AidResolution::Default {
                    service,
                    candidates: services_of(&survivors),
                    category,
                };
            }
        }
    }

    let candidates = services_of(&survivors);
    if candidates.len() == 1 && ctx.single_service_default {
        AidResolution::Default {
            service: candidates[0].clone(),
            candidates,
            category,
        }
    } else {
        AidResolution::Ambiguous {
            candidates,
            category,
        }
    }
}

fn services_of(candidates: &[MatchedCandidate]) -> Vec<Arc<CardEmulationService>> {
    candidates.iter().map(|c| c.service.clone()).collect()
}
