//! Per-activation outcome tracking

use shared_bus::DeactivationOutcome;
use shared_types::Category;
use uuid::Uuid;

/// What happened in one field-activation cycle, classified at deactivation.
#[derive(Clone, Debug)]
pub struct CycleTracker {
    pub cycle_id: Uuid,
    /// Category of the last resolved SELECT; `None` if nothing was selected
    category: Option<Category>,
    waiting_for_bind: bool,
    waiting_for_first_response: bool,
}

impl Default for CycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleTracker {
    pub fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            category: None,
            waiting_for_bind: false,
            waiting_for_first_response: false,
        }
    }

    /// A SELECT resolved to a service and was dispatched (or queued).
    pub fn select_dispatched(&mut self, category: Category) {
        self.category = Some(category);
        self.waiting_for_first_response = true;
    }

    pub fn bind_started(&mut self) {
        self.waiting_for_bind = true;
    }

    pub fn bind_completed(&mut self) {
        self.waiting_for_bind = false;
    }

    pub fn response_received(&mut self) {
        self.waiting_for_first_response = false;
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// Classification at deactivation; `None` when no SELECT was resolved.
    pub fn outcome(&self) -> Option<(DeactivationOutcome, Category)> {
        let category = self.category?;
        let outcome = if self.waiting_for_bind {
            DeactivationOutcome::DisconnectedBeforeBound
        } else if self.waiting_for_first_response {
            DeactivationOutcome::DisconnectedBeforeFirstResponse
        } else {
            DeactivationOutcome::Succeeded
        };
        Some((outcome, category))
    }
}
