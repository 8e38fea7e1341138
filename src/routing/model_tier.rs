//! Model tier recommendation from complexity and data sensitivity

use crate::config::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const HIGH_COMPLEXITY_KEYWORDS: &[&str] = &[
    "security",
    "vulnerability",
    "exploit",
    "cve",
    "audit",
    "architecture",
    "performance",
    "optimization",
    "distributed",
    "migration",
    "refactor",
    "compliance",
    "encryption",
];

pub const LOW_COMPLEXITY_KEYWORDS: &[&str] = &[
    "simple", "basic", "quick", "minor", "typo", "format", "style", "comment",
];

const BASE_COMPLEXITY: i32 = 5;

static HIGH_SENSITIVITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)password|credential|secret|private[-_ ]?key|api[-_ ]?key|token|\bssn\b|credit[-_ ]?card",
    )
    .expect("static regex is valid")
});

static MEDIUM_SENSITIVITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)internal|staging|user[-_ ]?data|customer|employee")
        .expect("static regex is valid")
});

static LOW_SENSITIVITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)email|phone|address|config").expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Powerful,
    Local,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Balanced => "balanced",
            ModelTier::Powerful => "powerful",
            ModelTier::Local => "local",
        }
    }

    fn default_model(&self) -> (&'static str, &'static str) {
        match self {
            ModelTier::Fast => ("gpt-4o-mini", "openai"),
            ModelTier::Balanced => ("claude-sonnet-4-20250514", "anthropic"),
            ModelTier::Powerful => ("claude-opus-4-20250514", "anthropic"),
            ModelTier::Local => ("llama3.1:8b", "ollama"),
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    None,
    Low,
    Medium,
    High,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityLevel::None => "none",
            SensitivityLevel::Low => "low",
            SensitivityLevel::Medium => "medium",
            SensitivityLevel::High => "high",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub id: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CatalogTier {
    #[serde(default)]
    pub models: Vec<CatalogModel>,
}

/// Tier to candidate model mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelCatalog {
    /// Keyed by tier name; unknown tiers are kept but never selected
    #[serde(default)]
    pub tiers: BTreeMap<String, CatalogTier>,
}

impl ModelCatalog {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), tiers = catalog.tiers.len(), "Loaded model catalog");
        Ok(catalog)
    }

    /// First catalog model for the tier, or the built-in default
    pub fn model_for(&self, tier: ModelTier) -> (String, String) {
        self.tiers
            .get(tier.as_str())
            .and_then(|t| t.models.first())
            .map(|m| (m.id.clone(), m.provider.clone()))
            .unwrap_or_else(|| {
                let (model, provider) = tier.default_model();
                (model.to_string(), provider.to_string())
            })
    }
}

/// Recommended model for executing a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecommendation {
    pub model: String,
    pub provider: String,
    pub tier: ModelTier,
    pub complexity_score: u8,
    pub sensitivity_level: SensitivityLevel,
    pub reasoning: String,
}

/// Keyword-adjusted complexity on a 1-10 scale, starting from 5
pub fn complexity_score(description: &str) -> u8 {
    let lowered = description.to_lowercase();
    let count = |keywords: &[&str]| -> i32 {
        keywords.iter().filter(|k| lowered.contains(*k)).count() as i32
    };
    let raw = BASE_COMPLEXITY + count(HIGH_COMPLEXITY_KEYWORDS) - count(LOW_COMPLEXITY_KEYWORDS);
    raw.clamp(1, 10) as u8
}

pub fn sensitivity_level(description: &str) -> SensitivityLevel {
    if HIGH_SENSITIVITY.is_match(description) {
        SensitivityLevel::High
    } else if MEDIUM_SENSITIVITY.is_match(description) {
        SensitivityLevel::Medium
    } else if LOW_SENSITIVITY.is_match(description) {
        SensitivityLevel::Low
    } else {
        SensitivityLevel::None
    }
}

pub fn select_tier(complexity: u8, sensitivity: SensitivityLevel) -> ModelTier {
    let by_complexity = if complexity >= 8 {
        ModelTier::Powerful
    } else if complexity <= 4 {
        ModelTier::Fast
    } else {
        ModelTier::Balanced
    };

    match (sensitivity, by_complexity) {
        (SensitivityLevel::High, _) => ModelTier::Local,
        (SensitivityLevel::Medium, ModelTier::Fast) => ModelTier::Balanced,
        (_, tier) => tier,
    }
}

pub fn recommend(description: &str, catalog: &ModelCatalog) -> ModelRecommendation {
    let complexity = complexity_score(description);
    let sensitivity = sensitivity_level(description);
    let tier = select_tier(complexity, sensitivity);
    let (model, provider) = catalog.model_for(tier);

    let reasoning = match sensitivity {
        SensitivityLevel::High => format!(
            "High data sensitivity requires a local model (complexity {complexity}/10)"
        ),
        SensitivityLevel::Medium if complexity <= 4 => format!(
            "Medium data sensitivity raises the fast tier to balanced (complexity {complexity}/10)"
        ),
        _ => format!(
            "Complexity {complexity}/10 with {sensitivity} sensitivity selects the {tier} tier"
        ),
    };

    ModelRecommendation {
        model,
        provider,
        tier,
        complexity_score: complexity,
        sensitivity_level: sensitivity,
        reasoning,
    }
}
