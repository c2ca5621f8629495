//! # Stack Configuration
//!
//! Unified configuration for the card emulation components and the
//! simulated controller.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. JSON file (`NFC_CONFIG` or the first CLI argument)
//! 3. Environment variables (`NFC_*`)
//!
//! ## Validation
//!
//! - Session delays must be non-zero
//! - Off-host services must name a configured secure element
//! - The matching mode, when set, must be 0..=3

use ce_01_aid_resolution::domain::CapabilityFlags;
use ce_01_aid_resolution::ResolutionConfig;
use ce_02_aid_routing::{AidMatchingMode, RoutingConfig, RoutingDestination, SecureElementRoutes};
use ce_03_host_emulation::SessionConfig;
use serde::{Deserialize, Serialize};
use shared_types::{CardEmulationService, UserId, MIN_AID_HEX_LEN};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Complete stack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Log level used when neither `NFC_LOG_LEVEL` nor `RUST_LOG` is set.
    pub log_level: Option<String>,
    pub resolution: ResolutionSection,
    pub routing: RoutingSection,
    pub controller: ControllerSection,
    pub session: SessionSection,
    /// Services installed for the initial user.
    pub services: Vec<CardEmulationService>,
    /// Package holding the wallet role at start-up.
    pub wallet_role_holder: Option<String>,
}

/// AID resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSection {
    pub min_aid_hex_len: usize,
    pub single_service_default: bool,
    pub initial_user: UserId,
}

impl Default for ResolutionSection {
    fn default() -> Self {
        Self {
            min_aid_hex_len: MIN_AID_HEX_LEN,
            single_service_default: true,
            initial_user: 0,
        }
    }
}

/// Routing-table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    pub default_route: u8,
    pub default_iso_dep_route: u8,
    pub default_offhost_route: u8,
    /// Route ids of `eSE1`, `eSE2`, ...
    pub ese: Vec<u8>,
    /// Route ids of `SIM1`, `SIM2`, ...
    pub uicc: Vec<u8>,
    /// Raw matching mode; derived from the controller when absent.
    pub matching_mode: Option<u8>,
    pub auto_change_enabled: bool,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            default_route: 0x00,
            default_iso_dep_route: 0x00,
            default_offhost_route: 0x00,
            ese: Vec::new(),
            uicc: Vec::new(),
            matching_mode: None,
            auto_change_enabled: true,
        }
    }
}

/// Simulated controller capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    /// Routing table size in bytes.
    pub capacity_bytes: usize,
    /// NCI version byte.
    pub nci_version: u8,
    pub prefix_matching: bool,
    pub subset_matching: bool,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            capacity_bytes: 256,
            nci_version: 0x20,
            prefix_matching: true,
            subset_matching: false,
        }
    }
}

/// Session timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub idle_delay_ms: u64,
    pub observe_reenable_delay_ms: u64,
    pub auto_disable_observe_delay_ms: u64,
    pub unroutable_report_delay_ms: u64,
    pub auto_disable_observe_mode: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_delay_ms: 5000,
            observe_reenable_delay_ms: 2000,
            auto_disable_observe_delay_ms: 3000,
            unroutable_report_delay_ms: 1000,
            auto_disable_observe_mode: true,
        }
    }
}

impl StackConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply `NFC_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("NFC_ROUTING_CAPACITY") {
            self.controller.capacity_bytes = parse_env("NFC_ROUTING_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("NFC_NCI_VERSION") {
            self.controller.nci_version = parse_env("NFC_NCI_VERSION", &value)?;
        }
        if let Some(value) = lookup("NFC_MATCHING_MODE") {
            self.routing.matching_mode = Some(parse_env("NFC_MATCHING_MODE", &value)?);
        }
        if let Some(value) = lookup("NFC_IDLE_DELAY_MS") {
            self.session.idle_delay_ms = parse_env("NFC_IDLE_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("NFC_WALLET_ROLE_HOLDER") {
            self.wallet_role_holder = Some(value).filter(|v| !v.is_empty());
        }
        Ok(())
    }

    /// Reject configurations the components cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let delays = [
            ("idle_delay_ms", self.session.idle_delay_ms),
            ("observe_reenable_delay_ms", self.session.observe_reenable_delay_ms),
            ("auto_disable_observe_delay_ms", self.session.auto_disable_observe_delay_ms),
            ("unroutable_report_delay_ms", self.session.unroutable_report_delay_ms),
        ];
        if let Some((name, _)) = delays.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroDelay(name));
        }

        if let Some(mode) = self.routing.matching_mode {
            AidMatchingMode::try_from(mode).map_err(|_| ConfigError::InvalidMatchingMode(mode))?;
        }

        let routes = self.secure_element_routes();
        for service in &self.services {
            if let Some(se) = &service.off_host_se {
                if routes.lookup(se).is_err() {
                    return Err(ConfigError::UnknownSecureElement {
                        service: service.component.to_string(),
                        secure_element: se.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn secure_element_routes(&self) -> SecureElementRoutes {
        SecureElementRoutes {
            ese: self.routing.ese.clone(),
            uicc: self.routing.uicc.clone(),
        }
    }

    pub fn resolution_config(&self) -> ResolutionConfig {
        ResolutionConfig {
            min_aid_hex_len: self.resolution.min_aid_hex_len,
            capabilities: CapabilityFlags {
                prefix_matching: self.controller.prefix_matching,
                subset_matching: self.controller.subset_matching,
            },
            nci_version_2: self.controller.nci_version >= ce_02_aid_routing::NCI_VERSION_2_0,
            single_service_default: self.resolution.single_service_default,
            initial_user: self.resolution.initial_user,
        }
    }

    /// Routing config. Call after [`validate`](Self::validate); an invalid
    /// matching mode falls back to controller detection.
    pub fn routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            default_route: RoutingDestination(self.routing.default_route),
            default_iso_dep_route: RoutingDestination(self.routing.default_iso_dep_route),
            default_offhost_route: RoutingDestination(self.routing.default_offhost_route),
            secure_elements: self.secure_element_routes(),
            matching_mode: self
                .routing
                .matching_mode
                .and_then(|mode| AidMatchingMode::try_from(mode).ok()),
            auto_change_enabled: self.routing.auto_change_enabled,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_delay: Duration::from_millis(self.session.idle_delay_ms),
            observe_reenable_delay: Duration::from_millis(self.session.observe_reenable_delay_ms),
            auto_disable_observe_delay: Duration::from_millis(
                self.session.auto_disable_observe_delay_ms,
            ),
            unroutable_report_delay: Duration::from_millis(self.session.unroutable_report_delay_ms),
            auto_disable_observe_mode: self.session.auto_disable_observe_mode,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Session delay {0} must be non-zero")]
    ZeroDelay(&'static str),

    #[error("AID matching mode {0} is out of range (0..=3)")]
    InvalidMatchingMode(u8),

    #[error("Service {service} names unknown secure element {secure_element:?}")]
    UnknownSecureElement {
        service: String,
        secure_element: String,
    },
}
