//! Resolution result types

use shared_types::{AidPattern, CardEmulationService, Category, ComponentName};
use std::sync::Arc;

/// A service whose registrations match an AID, with the registration that
/// matched most specifically.
#[derive(Clone, Debug)]
pub struct MatchedCandidate {
    pub service: Arc<CardEmulationService>,
    pub pattern: AidPattern,
    pub category: Category,
}

impl MatchedCandidate {
    pub fn component(&self) -> &ComponentName {
        &self.service.component
    }
}

/// Outcome of resolving one AID.
///
/// ```text
///            candidates?
///           ┌────┴─────┐
///          no         yes
///           │          │
///         None    tie-break rule?
///                 ┌────┴─────┐
///                yes         no
///                 │          │
///              Default   Ambiguous
/// ```
///
/// The default service of a `Default` is always one of its `candidates`.
#[derive(Clone, Debug, Default)]
pub enum AidResolution {
    /// No eligible service.
    #[default]
    None,
    /// Several eligible services and no rule to pick one.
    Ambiguous {
        candidates: Vec<Arc<CardEmulationService>>,
        category: Category,
    },
    /// One authoritative service.
    Default {
        service: Arc<CardEmulationService>,
        candidates: Vec<Arc<CardEmulationService>>,
        category: Category,
    },
}

impl AidResolution {
    /// Eligible services, empty for `None`.
    pub fn services(&self) -> &[Arc<CardEmulationService>] {
        match self {
            AidResolution::None => &[],
            AidResolution::Ambiguous { candidates, .. }
            | AidResolution::Default { candidates, .. } => candidates,
        }
    }

    pub fn default_service(&self) -> Option<&Arc<CardEmulationService>> {
        match self {
            AidResolution::Default { service, .. } => Some(service),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            AidResolution::None => None,
            AidResolution::Ambiguous { category, .. } | AidResolution::Default { category, .. } => {
                Some(*category)
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AidResolution::None)
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, AidResolution::Ambiguous { .. })
    }

    /// Whether `component` is among the eligible services.
    pub fn contains(&self, component: &ComponentName) -> bool {
        self.services().iter().any(|s| &s.component == component)
    }

    /// Find an eligible service by component.
    pub fn find(&self, component: &ComponentName) -> Option<&Arc<CardEmulationService>> {
        self.services().iter().find(|s| &s.component == component)
    }

    /// Short label for logs and metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            AidResolution::None => "none",
            AidResolution::Ambiguous { .. } => "ambiguous",
            AidResolution::Default { .. } => "default",
        }
    }
}
