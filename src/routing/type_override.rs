//! Type-prefix override
//!
//! A description such as `cve-2024-1234: investigate exposure` carries a
//! structured type in front of the first colon. Known types pin their expert
//! to at least 0.95 confidence.

use crate::routing::expert::Expert;
use once_cell::sync::Lazy;
use regex::Regex;

/// Confidence granted to the expert named by a recognized type prefix
pub const OVERRIDE_CONFIDENCE: f64 = 0.95;

/// Same value on the 0-100 scale
pub const OVERRIDE_SCORE: u8 = 95;

static TYPE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9]+(?:-[a-z0-9]+)*):").expect("static regex is valid")
});

/// Prefix families collapsed to their head token
const NORMALIZED_FAMILIES: &[&str] = &["cve", "vulnerability"];

const TYPE_TABLE: &[(&str, Expert)] = &[
    ("cve", Expert::Security),
    ("vulnerability", Expert::Security),
    ("security", Expert::Security),
    ("security-audit", Expert::Security),
    ("incident", Expert::Security),
    ("bug", Expert::Development),
    ("bugfix", Expert::Development),
    ("fix", Expert::Development),
    ("feature", Expert::Development),
    ("feat", Expert::Development),
    ("refactor", Expert::Development),
    ("test", Expert::Development),
    ("docs", Expert::Development),
    ("inventory", Expert::Inventory),
    ("asset", Expert::Inventory),
    ("discovery", Expert::Inventory),
    ("build", Expert::Cicd),
    ("ci", Expert::Cicd),
    ("cicd", Expert::Cicd),
    ("deploy", Expert::Cicd),
    ("pipeline", Expert::Cicd),
    ("release", Expert::Cicd),
];

/// A recognized type prefix
#[derive(Debug, Clone, PartialEq)]
pub struct TypeOverride {
    /// Prefix as written, e.g. `cve-2024-1234`
    pub raw_type: String,
    /// Normalized lookup key, e.g. `cve`
    pub normalized_type: String,
    pub expert: Expert,
    pub confidence: f64,
}

/// Extract the raw `type:` prefix, if any
pub fn extract_type_prefix(description: &str) -> Option<&str> {
    TYPE_PREFIX
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `cve-2024-1234` becomes `cve`, `vulnerability-high` becomes `vulnerability`
pub fn normalize_type(raw_type: &str) -> String {
    for family in NORMALIZED_FAMILIES {
        if raw_type
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with('-'))
        {
            return (*family).to_string();
        }
    }
    raw_type.to_string()
}

/// Detect a known type prefix and the expert it maps to
pub fn detect(description: &str) -> Option<TypeOverride> {
    let raw_type = extract_type_prefix(description)?;
    let normalized_type = normalize_type(raw_type);

    TYPE_TABLE
        .iter()
        .find(|(name, _)| *name == normalized_type)
        .map(|(_, expert)| TypeOverride {
            raw_type: raw_type.to_string(),
            normalized_type,
            expert: expert.clone(),
            confidence: OVERRIDE_CONFIDENCE,
        })
}
