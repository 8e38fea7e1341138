//! Expert identities
//!
//! The derived `Ord` is the tie-break priority: development, security,
//! inventory, cicd, then the reserved targets, then custom experts by name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named specialist routing target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Expert {
    Development,
    Security,
    Inventory,
    Cicd,
    /// Reserved: decomposes tasks too complex for a single specialist
    Initializer,
    /// Reserved: fallback when routing cannot decide
    Coordinator,
    /// Any other expert defined in the pattern store
    Custom(String),
}

impl Expert {
    pub fn as_str(&self) -> &str {
        match self {
            Expert::Development => "development",
            Expert::Security => "security",
            Expert::Inventory => "inventory",
            Expert::Cicd => "cicd",
            Expert::Initializer => "initializer",
            Expert::Coordinator => "coordinator",
            Expert::Custom(name) => name,
        }
    }

    /// Reserved targets are never scored by the cascade
    pub fn is_reserved(&self) -> bool {
        matches!(self, Expert::Initializer | Expert::Coordinator)
    }
}

impl From<String> for Expert {
    fn from(name: String) -> Self {
        let normalized = name.trim().to_lowercase();
        match normalized.as_str() {
            "development" => Expert::Development,
            "security" => Expert::Security,
            "inventory" => Expert::Inventory,
            "cicd" => Expert::Cicd,
            "initializer" => Expert::Initializer,
            "coordinator" => Expert::Coordinator,
            _ => Expert::Custom(normalized),
        }
    }
}

impl From<&str> for Expert {
    fn from(name: &str) -> Self {
        Expert::from(name.to_string())
    }
}

impl From<Expert> for String {
    fn from(expert: Expert) -> Self {
        expert.as_str().to_string()
    }
}

impl fmt::Display for Expert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_break_order() {
        let mut experts = vec![
            Expert::Custom("analytics".to_string()),
            Expert::Cicd,
            Expert::Inventory,
            Expert::Security,
            Expert::Development,
        ];
        experts.sort();

        assert_eq!(
            experts,
            vec![
                Expert::Development,
                Expert::Security,
                Expert::Inventory,
                Expert::Cicd,
                Expert::Custom("analytics".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Expert::from("Security"), Expert::Security);
        assert_eq!(Expert::from(" CICD "), Expert::Cicd);
        assert_eq!(
            Expert::from("Analytics"),
            Expert::Custom("analytics".to_string())
        );
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&Expert::Inventory).unwrap();
        assert_eq!(json, "\"inventory\"");

        let parsed: Expert = serde_json::from_str("\"coordinator\"").unwrap();
        assert_eq!(parsed, Expert::Coordinator);
        assert!(parsed.is_reserved());
    }
}
