//! Polling-loop filter matching and delivery thresholds

use ce_01_aid_resolution::RegisteredPollingFilter;
use regex::Regex;
use shared_types::{CardEmulationService, ComponentName, PollingFrame, PollingFrameType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Frames pending before the loop is evaluated at all.
pub const MIN_PENDING_FRAMES: usize = 3;
/// A or B frames needed to decide a reader is polling.
pub const TYPE_AB_THRESHOLD: usize = 3;
/// ON and OFF frames needed to decide a reader is polling.
pub const ON_OFF_THRESHOLD: usize = 2;

/// A service whose filter matched a frame.
#[derive(Clone, Debug)]
pub struct FilterMatch {
    pub service: Arc<CardEmulationService>,
    /// The matching filter asks for one transaction with observe mode off
    pub auto_transact: bool,
}

/// Literal and pattern filters of the current user's services.
#[derive(Debug, Default)]
pub struct PollingFilterIndex {
    literal: HashMap<String, Vec<FilterMatch>>,
    patterns: Vec<(Regex, Vec<FilterMatch>)>,
}

impl PollingFilterIndex {
    /// Index `filters`. Pattern filters that do not compile are skipped.
    pub fn build(filters: &[RegisteredPollingFilter]) -> Self {
        let mut index = Self::default();
        for registered in filters {
            let entry = FilterMatch {
                service: Arc::clone(&registered.service),
                auto_transact: registered.filter.auto_transact,
            };
            if !registered.is_pattern {
                index
                    .literal
                    .entry(registered.filter.filter.to_ascii_uppercase())
                    .or_default()
                    .push(entry);
                continue;
            }
            if let Some((_, services)) = index
                .patterns
                .iter_mut()
                .find(|(regex, _)| regex.as_str() == anchored(&registered.filter.filter))
            {
                services.push(entry);
                continue;
            }
            match Regex::new(&anchored(&registered.filter.filter)) {
                Ok(regex) => index.patterns.push((regex, vec![entry])),
                Err(err) => warn!(
                    service = %registered.service.component,
                    filter = %registered.filter.filter,
                    error = %err,
                    "Skipping invalid polling-loop pattern filter"
                ),
            }
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.literal.is_empty() && self.patterns.is_empty()
    }

    /// Services whose filters match `data_hex`: literal hits first, then
    /// pattern hits in declaration order.
    pub fn matching(&self, data_hex: &str) -> Vec<FilterMatch> {
        let mut matches: Vec<FilterMatch> =
            self.literal.get(data_hex).cloned().unwrap_or_default();
        for (regex, services) in &self.patterns {
            if regex.is_match(data_hex) {
                matches.extend(services.iter().cloned());
            }
        }
        matches
    }
}

/// Pattern filters must match the whole frame.
fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

/// Preference inputs for picking one of several matching services.
#[derive(Clone, Copy, Debug, Default)]
pub struct TieBreakContext<'a> {
    pub foreground: Option<&'a ComponentName>,
    pub wallet_holder: Option<&'a str>,
    pub preferred_payment: Option<&'a ComponentName>,
}

/// Pick the service that receives a frame matched by several filters.
///
/// Foreground first; then the wallet holder's services, the
/// case-insensitively smallest component name winning; then the preferred
/// payment service; then the first match.
pub fn break_tie<'m>(matches: &'m [FilterMatch], ctx: &TieBreakContext<'_>) -> Option<&'m FilterMatch> {
    if let Some(foreground) = ctx.foreground {
        if let Some(m) = matches.iter().find(|m| &m.service.component == foreground) {
            return Some(m);
        }
    }
    if let Some(holder) = ctx.wallet_holder {
        let wallet = matches
            .iter()
            .filter(|m| m.service.package() == holder)
            .min_by_key(|m| m.service.component.to_string().to_lowercase());
        if wallet.is_some() {
            return wallet;
        }
    }
    if let Some(payment) = ctx.preferred_payment {
        if let Some(m) = matches.iter().find(|m| &m.service.component == payment) {
            return Some(m);
        }
    }
    matches.first()
}

/// Whether the pending A/B/ON/OFF frames look like a reader polling.
pub fn should_deliver_pending(pending: &[PollingFrame]) -> bool {
    if pending.len() < MIN_PENDING_FRAMES {
        return false;
    }
    let (mut a, mut b, mut on, mut off) = (0, 0, 0, 0);
    for frame in pending {
        match frame.frame_type {
            PollingFrameType::A => {
                a += 1;
                if a > TYPE_AB_THRESHOLD {
                    return true;
                }
            }
            PollingFrameType::B => {
                b += 1;
                if b > TYPE_AB_THRESHOLD {
                    return true;
                }
            }
            PollingFrameType::On => on += 1,
            PollingFrameType::Off => {
                off += 1;
                if on >= ON_OFF_THRESHOLD && off >= ON_OFF_THRESHOLD {
                    return true;
                }
            }
            PollingFrameType::F | PollingFrameType::Unknown => {}
        }
    }
    false
}
