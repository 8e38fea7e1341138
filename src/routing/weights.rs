//! Learned and utility weights, and the adjuster that applies them
//!
//! Both weight sources are produced offline and consumed here as read-only
//! snapshots. Adjustment runs on the 0-100 scale and every pass ends clamped.

use crate::config::ConfigError;
use crate::routing::expert::Expert;
use crate::routing::scorer::MAX_SCORE;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MAX_PREFERENCE_BOOST: f64 = 10.0;
pub const MAX_LEARNED_KEYWORD_BOOST: f64 = 15.0;
pub const MAX_UTILITY_KEYWORD_ADJUSTMENT: f64 = 10.0;

const SUCCESS_KEYWORD_WEIGHT: f64 = 1.0;
const FAILURE_KEYWORD_WEIGHT: f64 = -1.0;

static UTILITY_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^utility_weights_(\d{8}_\d{6})\.json$").expect("static regex is valid")
});

/// Lowercased alphanumeric words of a description, repeats kept
pub fn description_words(description: &str) -> Vec<String> {
    description
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

fn finite_or_warn(name: &str, value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        warn!(weight = name, "Ignoring non-finite weight");
        None
    }
}

#[derive(Debug, Deserialize)]
struct LearnedWeightDocument {
    #[serde(default)]
    routing_patterns: Vec<RoutingPattern>,
    #[serde(default)]
    successful_patterns: Vec<KeywordPattern>,
    #[serde(default)]
    failed_patterns: Vec<KeywordPattern>,
}

#[derive(Debug, Deserialize)]
struct RoutingPattern {
    preferred_worker_type: String,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    avg_score: f64,
}

#[derive(Debug, Deserialize)]
struct KeywordPattern {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Preferences and keyword weights learned from historical outcomes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LearnedWeights {
    pub expert_preference: BTreeMap<Expert, f64>,
    pub keyword_weight: BTreeMap<String, f64>,
}

impl LearnedWeights {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document: LearnedWeightDocument = read_json(path)?;
        Ok(Self::from_document(document))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let document: LearnedWeightDocument =
            serde_json::from_str(content).map_err(|source| ConfigError::JsonParse {
                path: PathBuf::new(),
                source,
            })?;
        Ok(Self::from_document(document))
    }

    fn from_document(document: LearnedWeightDocument) -> Self {
        // Count-weighted mean of avg_score per expert
        let mut totals: BTreeMap<Expert, (f64, u64)> = BTreeMap::new();
        for pattern in document.routing_patterns {
            let Some(avg) = finite_or_warn(&pattern.preferred_worker_type, pattern.avg_score)
            else {
                continue;
            };
            let entry = totals
                .entry(Expert::from(pattern.preferred_worker_type))
                .or_insert((0.0, 0));
            entry.0 += avg * pattern.count as f64;
            entry.1 += pattern.count;
        }

        let expert_preference = totals
            .into_iter()
            .map(|(expert, (weighted_sum, count))| {
                let preference = if count == 0 {
                    0.0
                } else {
                    weighted_sum / count as f64
                };
                (expert, preference)
            })
            .collect();

        let mut keyword_weight: BTreeMap<String, f64> = BTreeMap::new();
        for (patterns, weight) in [
            (&document.successful_patterns, SUCCESS_KEYWORD_WEIGHT),
            (&document.failed_patterns, FAILURE_KEYWORD_WEIGHT),
        ] {
            for pattern in patterns {
                for keyword in &pattern.keywords {
                    let keyword = keyword.trim().to_lowercase();
                    if !keyword.is_empty() {
                        *keyword_weight.entry(keyword).or_insert(0.0) += weight;
                    }
                }
            }
        }

        Self {
            expert_preference,
            keyword_weight,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct UtilityWeightDocument {
    #[serde(default)]
    expert_weights: BTreeMap<String, f64>,
    #[serde(default)]
    keyword_weights: BTreeMap<String, f64>,
    #[serde(default)]
    confidence_calibration: BTreeMap<String, f64>,
}

/// Externally calibrated multipliers and additive adjustments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UtilityWeights {
    /// Timestamp of the snapshot file, `None` when no snapshot was found
    pub version: Option<String>,
    pub expert_multiplier: BTreeMap<Expert, f64>,
    pub keyword_additive: BTreeMap<String, f64>,
    pub calibration_factor: BTreeMap<Expert, f64>,
}

impl UtilityWeights {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let document: UtilityWeightDocument =
            serde_json::from_str(content).map_err(|source| ConfigError::JsonParse {
                path: PathBuf::new(),
                source,
            })?;
        Ok(Self::from_document(document, None))
    }

    fn from_document(document: UtilityWeightDocument, version: Option<String>) -> Self {
        let non_negative = |map: BTreeMap<String, f64>| -> BTreeMap<Expert, f64> {
            map.into_iter()
                .filter_map(|(name, value)| {
                    let value = finite_or_warn(&name, value)?;
                    if value < 0.0 {
                        warn!(expert = %name, value, "Ignoring negative utility factor");
                        return None;
                    }
                    Some((Expert::from(name), value))
                })
                .collect()
        };

        Self {
            version,
            expert_multiplier: non_negative(document.expert_weights),
            keyword_additive: document
                .keyword_weights
                .into_iter()
                .filter_map(|(keyword, value)| {
                    finite_or_warn(&keyword, value).map(|v| (keyword.to_lowercase(), v))
                })
                .collect(),
            calibration_factor: non_negative(document.confidence_calibration),
        }
    }

    /// Load the newest `utility_weights_<YYYYMMDD>_<HHMMSS>.json` in a directory
    ///
    /// A directory without snapshots yields neutral weights.
    pub fn load_latest(dir: &Path) -> Result<Self, ConfigError> {
        let Some((version, path)) = latest_utility_snapshot(dir)? else {
            warn!(dir = %dir.display(), "No utility weight snapshot found, using neutral weights");
            return Ok(Self::default());
        };

        let document: UtilityWeightDocument = read_json(&path)?;
        debug!(path = %path.display(), version = %version, "Loaded utility weights");
        Ok(Self::from_document(document, Some(version)))
    }

    pub fn multiplier(&self, expert: &Expert) -> f64 {
        self.expert_multiplier.get(expert).copied().unwrap_or(1.0)
    }

    pub fn calibration(&self, expert: &Expert) -> f64 {
        self.calibration_factor.get(expert).copied().unwrap_or(1.0)
    }
}

/// Find the snapshot file with the newest filename timestamp
pub fn latest_utility_snapshot(dir: &Path) -> Result<Option<(String, PathBuf)>, ConfigError> {
    let mut latest: Option<(NaiveDateTime, String, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stamp) = UTILITY_FILE_NAME
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };
        let Ok(parsed) = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d_%H%M%S") else {
            warn!(file = name, "Skipping utility snapshot with invalid timestamp");
            continue;
        };

        if latest.as_ref().map_or(true, |(best, _, _)| parsed > *best) {
            latest = Some((parsed, stamp, entry.path()));
        }
    }

    Ok(latest.map(|(_, stamp, path)| (stamp, path)))
}

/// Boost contributed by learned weights, before clamping onto the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedBoost {
    pub preference: f64,
    pub keyword: f64,
}

pub fn learned_boost(expert: &Expert, words: &[String], learned: &LearnedWeights) -> LearnedBoost {
    let preference = learned
        .expert_preference
        .get(expert)
        .map(|pref| (pref * 2.0).clamp(0.0, MAX_PREFERENCE_BOOST))
        .unwrap_or(0.0);

    let keyword: f64 = words
        .iter()
        .filter_map(|w| learned.keyword_weight.get(w))
        .sum();

    LearnedBoost {
        preference,
        keyword: keyword.clamp(-MAX_LEARNED_KEYWORD_BOOST, MAX_LEARNED_KEYWORD_BOOST),
    }
}

/// Sum of utility keyword adjustments, clamped to ±10
pub fn utility_keyword_adjustment(words: &[String], utility: &UtilityWeights) -> f64 {
    let total: f64 = words
        .iter()
        .filter_map(|w| utility.keyword_additive.get(w))
        .sum();
    total.clamp(
        -MAX_UTILITY_KEYWORD_ADJUSTMENT,
        MAX_UTILITY_KEYWORD_ADJUSTMENT,
    )
}

fn to_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, MAX_SCORE as f64) as u8
}

pub fn apply_learned(score: u8, expert: &Expert, words: &[String], learned: &LearnedWeights) -> u8 {
    let boost = learned_boost(expert, words, learned);
    to_score(score as f64 + boost.preference + boost.keyword)
}

pub fn apply_utility(score: u8, expert: &Expert, words: &[String], utility: &UtilityWeights) -> u8 {
    let mut value = score as f64;

    let multiplier = utility.multiplier(expert);
    if multiplier != 1.0 {
        value *= multiplier;
    }

    value += utility_keyword_adjustment(words, utility);

    let calibration = utility.calibration(expert);
    if calibration != 1.0 {
        value *= calibration;
    }

    to_score(value)
}

/// Applies the enabled weight passes in fixed order: learned, then utility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightAdjuster {
    pub learned_enabled: bool,
    pub utility_enabled: bool,
}

impl Default for WeightAdjuster {
    fn default() -> Self {
        Self {
            learned_enabled: true,
            utility_enabled: true,
        }
    }
}

impl WeightAdjuster {
    pub fn new(learned_enabled: bool, utility_enabled: bool) -> Self {
        Self {
            learned_enabled,
            utility_enabled,
        }
    }

    pub fn adjust(
        &self,
        expert: &Expert,
        score: u8,
        words: &[String],
        learned: &LearnedWeights,
        utility: &UtilityWeights,
    ) -> u8 {
        let mut adjusted = score.min(MAX_SCORE);
        if self.learned_enabled {
            adjusted = apply_learned(adjusted, expert, words, learned);
        }
        if self.utility_enabled {
            adjusted = apply_utility(adjusted, expert, words, utility);
        }
        if adjusted != score {
            debug!(expert = %expert, raw = score, adjusted, "Adjusted expert score");
        }
        adjusted
    }

    pub fn adjust_all(
        &self,
        scores: &BTreeMap<Expert, u8>,
        words: &[String],
        learned: &LearnedWeights,
        utility: &UtilityWeights,
    ) -> BTreeMap<Expert, u8> {
        scores
            .iter()
            .map(|(expert, score)| {
                (
                    expert.clone(),
                    self.adjust(expert, *score, words, learned, utility),
                )
            })
            .collect()
    }
}
