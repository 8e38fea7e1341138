//! Pattern store: routing thresholds and per-expert keyword lists

use crate::config::ConfigError;
use crate::routing::expert::Expert;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Global routing thresholds, all on the 0.0-1.0 scale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingThresholds {
    pub single_expert: f64,
    pub multi_expert: f64,
    pub minimum_activation: f64,
}

impl Default for RoutingThresholds {
    fn default() -> Self {
        Self {
            single_expert: 0.75,
            multi_expert: 0.5,
            minimum_activation: 0.3,
        }
    }
}

impl RoutingThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("single_expert", self.single_expert),
            ("multi_expert", self.multi_expert),
            ("minimum_activation", self.minimum_activation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidConfig(format!(
                    "threshold {name} = {value} must be within 0.0..=1.0"
                )));
            }
        }
        Ok(())
    }
}

/// Keyword lists for one expert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExpertPatterns {
    #[serde(default)]
    pub activation_keywords: Vec<String>,
    #[serde(default)]
    pub confidence_boosters: Vec<String>,
    #[serde(default)]
    pub negative_indicators: Vec<String>,
}

impl ExpertPatterns {
    fn normalized(self) -> Self {
        let lower = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            activation_keywords: lower(self.activation_keywords),
            confidence_boosters: lower(self.confidence_boosters),
            negative_indicators: lower(self.negative_indicators),
        }
    }
}

/// Snapshot of the pattern store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatternStore {
    #[serde(default)]
    pub thresholds: RoutingThresholds,
    #[serde(default)]
    pub experts: BTreeMap<Expert, ExpertPatterns>,
}

impl PatternStore {
    /// Load the pattern store; a missing file is reported as `StoreNotFound`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::StoreNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json(&content).map_err(|e| match e {
            ConfigError::JsonParse { source, .. } => ConfigError::JsonParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(
            path = %path.display(),
            experts = store.experts.len(),
            "Loaded pattern store"
        );
        Ok(store)
    }

    /// Parse, validate and normalize a pattern store document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let raw: PatternStore =
            serde_json::from_str(content).map_err(|source| ConfigError::JsonParse {
                path: Default::default(),
                source,
            })?;
        raw.thresholds.validate()?;

        let experts = raw
            .experts
            .into_iter()
            .filter_map(|(expert, patterns)| {
                if expert.is_reserved() {
                    warn!(expert = %expert, "Ignoring keyword patterns for reserved expert");
                    None
                } else {
                    Some((expert, patterns.normalized()))
                }
            })
            .collect();

        Ok(Self {
            thresholds: raw.thresholds,
            experts,
        })
    }

    pub fn contains(&self, expert: &Expert) -> bool {
        self.experts.contains_key(expert)
    }
}
