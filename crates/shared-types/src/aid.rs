//! # AID Patterns
//!
//! An AID registration is one of three shapes:
//!
//! | Shape  | Marker | Matches incoming AID `X` when            |
//! |--------|--------|------------------------------------------|
//! | Exact  | none   | `X == body`                              |
//! | Prefix | `*`    | `X` starts with `body`                   |
//! | Subset | `#`    | `body` starts with `X`                   |
//!
//! Bodies are normalised to uppercase and validated once at construction.

use crate::errors::AidFormatError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest valid AID body in hex characters (5 bytes).
pub const MIN_AID_HEX_LEN: usize = 10;

/// Longest valid AID body in hex characters (16 bytes).
pub const MAX_AID_HEX_LEN: usize = 32;

const PREFIX_MARKER: char = '*';
const SUBSET_MARKER: char = '#';

/// How a registered pattern matches incoming AIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AidMatchKind {
    Exact,
    Prefix,
    Subset,
}

/// A validated, uppercase AID registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AidPattern {
    body: String,
    kind: AidMatchKind,
}

impl AidPattern {
    /// Parse a registration string such as `A0000000041010`, `A000000004*`
    /// or `A000000004101012#`.
    pub fn parse(raw: &str) -> Result<Self, AidFormatError> {
        let upper = raw.trim().to_ascii_uppercase();
        let (body, kind) = if let Some(stripped) = upper.strip_suffix(PREFIX_MARKER) {
            (stripped.to_string(), AidMatchKind::Prefix)
        } else if let Some(stripped) = upper.strip_suffix(SUBSET_MARKER) {
            (stripped.to_string(), AidMatchKind::Subset)
        } else {
            (upper, AidMatchKind::Exact)
        };
        validate_body(&body)?;
        Ok(Self { body, kind })
    }

    /// The hex body without any marker.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn kind(&self) -> AidMatchKind {
        self.kind
    }

    pub fn is_exact(&self) -> bool {
        self.kind == AidMatchKind::Exact
    }

    pub fn is_prefix(&self) -> bool {
        self.kind == AidMatchKind::Prefix
    }

    pub fn is_subset(&self) -> bool {
        self.kind == AidMatchKind::Subset
    }

    /// Does this registration match a concrete (marker-free, uppercase) AID?
    pub fn matches(&self, aid: &str) -> bool {
        match self.kind {
            AidMatchKind::Exact => self.body == aid,
            AidMatchKind::Prefix => aid.starts_with(&self.body),
            AidMatchKind::Subset => self.body.starts_with(aid),
        }
    }

    /// Does this registration cover `other`, i.e. every AID matched by
    /// `other` is also matched by `self`?
    pub fn covers(&self, other: &AidPattern) -> bool {
        match (self.kind, other.kind) {
            (AidMatchKind::Prefix, AidMatchKind::Exact | AidMatchKind::Prefix) => {
                other.body.starts_with(&self.body)
            }
            (AidMatchKind::Subset, AidMatchKind::Exact) => self.body.starts_with(&other.body),
            _ => self == other,
        }
    }

    /// Do two registrations overlap on at least one concrete AID?
    pub fn overlaps(&self, other: &AidPattern) -> bool {
        let (short, long) = if self.body.len() <= other.body.len() {
            (self, other)
        } else {
            (other, self)
        };
        match (self.kind, other.kind) {
            (AidMatchKind::Exact, AidMatchKind::Exact) => self.body == other.body,
            _ => long.body.starts_with(&short.body),
        }
    }

    /// Specificity rank used to pick one registration per service:
    /// exact beats prefix beats subset, longer beats shorter.
    pub fn specificity(&self) -> (u8, usize) {
        let rank = match self.kind {
            AidMatchKind::Exact => 2,
            AidMatchKind::Prefix => 1,
            AidMatchKind::Subset => 0,
        };
        (rank, self.body.len())
    }
}

impl fmt::Display for AidPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AidMatchKind::Exact => write!(f, "{}", self.body),
            AidMatchKind::Prefix => write!(f, "{}{}", self.body, PREFIX_MARKER),
            AidMatchKind::Subset => write!(f, "{}{}", self.body, SUBSET_MARKER),
        }
    }
}

impl TryFrom<String> for AidPattern {
    type Error = AidFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AidPattern> for String {
    fn from(value: AidPattern) -> Self {
        value.to_string()
    }
}

/// True when `aid` is a well-formed concrete AID (no marker).
pub fn is_valid_aid(aid: &str) -> bool {
    validate_body(aid).is_ok()
}

fn validate_body(body: &str) -> Result<(), AidFormatError> {
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AidFormatError::NotHex {
            aid: body.to_string(),
        });
    }
    let len = body.len();
    if len % 2 != 0 {
        return Err(AidFormatError::OddLength {
            aid: body.to_string(),
            len,
        });
    }
    if !(MIN_AID_HEX_LEN..=MAX_AID_HEX_LEN).contains(&len) {
        return Err(AidFormatError::BadLength {
            aid: body.to_string(),
            len,
            min: MIN_AID_HEX_LEN,
            max: MAX_AID_HEX_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_normalises_case() {
        let aid = AidPattern::parse("a0000000041010").unwrap();
        assert_eq!(aid.body(), "A0000000041010");
        assert!(aid.is_exact());
    }

    #[test]
    fn test_parse_markers() {
        assert!(AidPattern::parse("A000000004*").unwrap().is_prefix());
        assert!(AidPattern::parse("A00000000410#").unwrap().is_subset());
        assert_eq!(AidPattern::parse("a000000004*").unwrap().to_string(), "A000000004*");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            AidPattern::parse("A00000000G"),
            Err(AidFormatError::NotHex { .. })
        ));
        assert!(matches!(
            AidPattern::parse("A000000004101"),
            Err(AidFormatError::OddLength { .. })
        ));
        assert!(matches!(
            AidPattern::parse("A0000000"),
            Err(AidFormatError::BadLength { .. })
        ));
        assert!(AidPattern::parse("**").is_err());
    }

    #[test]
    fn test_matching_shapes() {
        let exact = AidPattern::parse("A0000000041010").unwrap();
        let prefix = AidPattern::parse("A000000004*").unwrap();
        let subset = AidPattern::parse("A0000000041010AA#").unwrap();

        assert!(exact.matches("A0000000041010"));
        assert!(!exact.matches("A000000004101011"));
        assert!(prefix.matches("A0000000041010"));
        assert!(!prefix.matches("A000000003"));
        assert!(subset.matches("A0000000041010"));
        assert!(!subset.matches("A0000000041010AABB"));
    }

    #[test]
    fn test_covers() {
        let prefix = AidPattern::parse("A000000004*").unwrap();
        let exact = AidPattern::parse("A0000000041010").unwrap();
        let other = AidPattern::parse("A0000000031010").unwrap();
        assert!(prefix.covers(&exact));
        assert!(!prefix.covers(&other));
        assert!(!exact.covers(&prefix));
    }

    #[test]
    fn test_specificity_order() {
        let exact = AidPattern::parse("A0000000041010").unwrap();
        let long_prefix = AidPattern::parse("A00000000410*").unwrap();
        let short_prefix = AidPattern::parse("A000000004*").unwrap();
        assert!(exact.specificity() > long_prefix.specificity());
        assert!(long_prefix.specificity() > short_prefix.specificity());
    }

    #[test]
    fn test_serde_uses_registration_string() {
        let aid = AidPattern::parse("A000000004*").unwrap();
        let json = serde_json::to_string(&aid).unwrap();
        assert_eq!(json, "\"A000000004*\"");
        let back: AidPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, aid);
    }

    proptest! {
        #[test]
        fn property_prefix_matches_its_extensions(
            body in "[0-9A-F]{10}",
            tail in "[0-9A-F]{0,6}",
        ) {
            let prefix = AidPattern::parse(&format!("{body}*")).unwrap();
            let aid = format!("{body}{tail}");
            prop_assert!(prefix.matches(&aid));
        }

        #[test]
        fn property_overlap_is_symmetric(
            a in "[0-9A-F]{10}[*#]?",
            b in "[0-9A-F]{10}[*#]?",
        ) {
            let a = AidPattern::parse(&a).unwrap();
            let b = AidPattern::parse(&b).unwrap();
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
    }
}
