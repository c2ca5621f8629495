//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `ComponentName`, `UserId`
//! - **Registration**: `CardEmulationService`, `AidRegistration`, `Category`
//! - **Polling loop**: `PollingLoopFilter`
//! - **Session**: `DeactivationReason`

use crate::aid::AidPattern;
use crate::errors::ComponentNameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Platform user the service is installed for. Negative means "no user".
pub type UserId = i32;

/// Identity of a card emulation service (package + class).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentName {
    /// Owning package.
    pub package: String,
    /// Service class inside the package.
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

impl FromStr for ComponentName {
    type Err = ComponentNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (package, class) = s
            .split_once('/')
            .ok_or_else(|| ComponentNameError::MissingSeparator(s.to_string()))?;
        if package.is_empty() || class.is_empty() {
            return Err(ComponentNameError::EmptyPart(s.to_string()));
        }
        Ok(Self::new(package, class))
    }
}

// =============================================================================
// CLUSTER B: REGISTRATION
// =============================================================================

/// AID category a service declares for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Payment,
    #[default]
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Payment => write!(f, "payment"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// One AID declaration of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AidRegistration {
    pub pattern: AidPattern,
    pub category: Category,
}

/// A polling-loop filter declared by a service.
///
/// `filter` is uppercase hex for literal filters, or a regular expression
/// over uppercase hex for pattern filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingLoopFilter {
    pub filter: String,
    /// Disable observe mode for one transaction when this filter matches.
    #[serde(default)]
    pub auto_transact: bool,
}

/// Descriptor of an installed card emulation service.
///
/// Rebuilt wholesale by the Service Registry on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEmulationService {
    /// Service identity.
    pub component: ComponentName,
    /// Owning user.
    pub user_id: UserId,
    /// Owning uid.
    #[serde(default)]
    pub uid: u32,
    /// Human readable label shown by chooser surfaces.
    #[serde(default)]
    pub description: String,
    /// Runs on the host (HCE) rather than in a secure element.
    #[serde(default = "default_true")]
    pub on_host: bool,
    /// Secure element name (`eSE1`, `SIM1`, ...) for off-host services.
    #[serde(default)]
    pub off_host_se: Option<String>,
    /// AID declarations in declaration order.
    #[serde(default)]
    pub registrations: Vec<AidRegistration>,
    /// Device must be unlocked before the service may answer.
    #[serde(default)]
    pub requires_unlock: bool,
    /// Screen must be on before the service may answer.
    #[serde(default)]
    pub requires_screen_on: bool,
    /// User has enabled this service for category OTHER.
    #[serde(default = "default_true")]
    pub category_other_enabled: bool,
    /// Literal polling-loop filters.
    #[serde(default)]
    pub polling_loop_filters: Vec<PollingLoopFilter>,
    /// Pattern polling-loop filters.
    #[serde(default)]
    pub polling_loop_pattern_filters: Vec<PollingLoopFilter>,
    /// Service prefers observe mode to be on by default.
    #[serde(default)]
    pub default_observe_mode: bool,
}

fn default_true() -> bool {
    true
}

impl CardEmulationService {
    /// Host-resident service with no registrations.
    pub fn host(component: ComponentName, user_id: UserId) -> Self {
        Self {
            component,
            user_id,
            uid: 0,
            description: String::new(),
            on_host: true,
            off_host_se: None,
            registrations: Vec::new(),
            requires_unlock: false,
            requires_screen_on: false,
            category_other_enabled: true,
            polling_loop_filters: Vec::new(),
            polling_loop_pattern_filters: Vec::new(),
            default_observe_mode: false,
        }
    }

    /// Secure-element resident service with no registrations.
    pub fn off_host(component: ComponentName, user_id: UserId, secure_element: &str) -> Self {
        Self {
            on_host: false,
            off_host_se: Some(secure_element.to_string()),
            ..Self::host(component, user_id)
        }
    }

    /// Builder helper: append an AID registration.
    pub fn with_aid(mut self, pattern: AidPattern, category: Category) -> Self {
        self.registrations.push(AidRegistration { pattern, category });
        self
    }

    pub fn package(&self) -> &str {
        &self.component.package
    }

    /// Category declared for `pattern`, if the service registered it.
    pub fn category_for(&self, pattern: &AidPattern) -> Option<Category> {
        self.registrations
            .iter()
            .find(|r| &r.pattern == pattern)
            .map(|r| r.category)
    }

    /// Whether any registration is a PAYMENT one.
    pub fn has_payment_registrations(&self) -> bool {
        self.registrations
            .iter()
            .any(|r| r.category == Category::Payment)
    }
}

// =============================================================================
// CLUSTER C: SESSION
// =============================================================================

/// Reason sent to a service when it stops receiving APDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeactivationReason {
    /// The reader left the field.
    LinkLoss,
    /// The reader selected a different AID.
    Deselected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name_round_trip() {
        let name: ComponentName = "com.example.pay/.PayService".parse().unwrap();
        assert_eq!(name.package, "com.example.pay");
        assert_eq!(name.to_string(), "com.example.pay/.PayService");
    }

    #[test]
    fn test_component_name_rejects_malformed() {
        assert!("nopackage".parse::<ComponentName>().is_err());
        assert!("/cls".parse::<ComponentName>().is_err());
    }

    #[test]
    fn test_category_for() {
        let svc = CardEmulationService::host(ComponentName::new("p", "c"), 0)
            .with_aid(AidPattern::parse("A0000000041010").unwrap(), Category::Payment);
        let pattern = AidPattern::parse("A0000000041010").unwrap();
        assert_eq!(svc.category_for(&pattern), Some(Category::Payment));
        assert!(svc.has_payment_registrations());
    }

    #[test]
    fn test_service_deserialises_with_defaults() {
        let json = r#"{
            "component": {"package": "com.example", "class": ".Svc"},
            "user_id": 0,
            "registrations": [{"pattern": "F0010203040506", "category": "other"}]
        }"#;
        let svc: CardEmulationService = serde_json::from_str(json).unwrap();
        assert!(svc.on_host);
        assert!(svc.category_other_enabled);
        assert_eq!(svc.registrations.len(), 1);
    }
}
