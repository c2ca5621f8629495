//! # Device State and User Prompts
//!
//! Headless stand-ins for the keyguard, screen and UI surfaces. Prompts are
//! logged rather than shown.

use ce_03_host_emulation::{DeviceState, UserPrompts};
use nfc_telemetry::log_service_event;
use parking_lot::RwLock;
use shared_types::{CardEmulationService, Category, ComponentName};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Device state toggled by the runtime or tests.
pub struct StaticDeviceState {
    locked: AtomicBool,
    screen_on: AtomicBool,
    secure_nfc: AtomicBool,
    foreground: RwLock<Vec<String>>,
}

impl Default for StaticDeviceState {
    fn default() -> Self {
        Self {
            locked: AtomicBool::new(false),
            screen_on: AtomicBool::new(true),
            secure_nfc: AtomicBool::new(false),
            foreground: RwLock::new(Vec::new()),
        }
    }
}

impl StaticDeviceState {
    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn set_screen_on(&self, on: bool) {
        self.screen_on.store(on, Ordering::SeqCst);
    }

    pub fn set_secure_nfc(&self, enabled: bool) {
        self.secure_nfc.store(enabled, Ordering::SeqCst);
    }

    pub fn set_foreground_packages(&self, packages: Vec<String>) {
        *self.foreground.write() = packages;
    }
}

impl DeviceState for StaticDeviceState {
    fn is_keyguard_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn is_screen_on(&self) -> bool {
        self.screen_on.load(Ordering::SeqCst)
    }

    fn is_secure_nfc_enabled(&self) -> bool {
        self.secure_nfc.load(Ordering::SeqCst)
    }

    fn foreground_packages(&self) -> Vec<String> {
        self.foreground.read().clone()
    }
}

/// What the last prompt asked the user to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptRecord {
    Chooser {
        candidates: Vec<ComponentName>,
        category: Category,
    },
    TapAgain(ComponentName),
    TapAgainDismissed,
    Unlock,
}

/// Logs every prompt and keeps the history.
#[derive(Default)]
pub struct LoggingPrompts {
    history: RwLock<Vec<PromptRecord>>,
}

impl LoggingPrompts {
    pub fn history(&self) -> Vec<PromptRecord> {
        self.history.read().clone()
    }
}

impl UserPrompts for LoggingPrompts {
    fn show_chooser(
        &self,
        candidates: &[Arc<CardEmulationService>],
        failed_component: Option<&ComponentName>,
        category: Category,
    ) {
        let names: Vec<ComponentName> = candidates.iter().map(|s| s.component.clone()).collect();
        info!(
            subsystem = "runtime",
            candidates = ?names,
            failed = ?failed_component,
            %category,
            "Chooser shown"
        );
        self.history.write().push(PromptRecord::Chooser {
            candidates: names,
            category,
        });
    }

    fn show_tap_again(&self, service: &CardEmulationService, category: Category) {
        log_service_event!(info, "runtime", "Tap-again prompt shown", service.component, %category);
        self.history
            .write()
            .push(PromptRecord::TapAgain(service.component.clone()));
    }

    fn dismiss_tap_again(&self) {
        info!(subsystem = "runtime", "Tap-again prompt dismissed");
        self.history.write().push(PromptRecord::TapAgainDismissed);
    }

    fn request_unlock(&self) {
        info!(subsystem = "runtime", "Unlock requested");
        self.history.write().push(PromptRecord::Unlock);
    }
}
