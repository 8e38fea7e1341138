//! Keyword, booster and negative-indicator scorer
//!
//! Matching is substring based on the lowercased description, so `cve`
//! matches `CVE-2024-1234`. The score is additive rather than a ratio:
//! two or three keywords plus a booster or two reach 80.

use crate::routing::expert::Expert;
use crate::routing::patterns::{ExpertPatterns, PatternStore};
use std::collections::BTreeMap;

pub const KEYWORD_POINTS: i32 = 25;
pub const BOOSTER_POINTS: i32 = 12;
pub const NEGATIVE_POINTS: i32 = 30;
pub const MAX_SCORE: u8 = 100;

/// Baseline score of one expert on the 0-100 scale
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordScore {
    pub score: u8,
    pub matched_keywords: Vec<String>,
    pub matched_boosters: Vec<String>,
    pub matched_negatives: Vec<String>,
}

/// Clamp any intermediate value onto the 0-100 integer scale
pub fn clamp_score(value: i32) -> u8 {
    value.clamp(0, MAX_SCORE as i32) as u8
}

fn matches_in(description: &str, terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .filter(|term| description.contains(term.as_str()))
        .cloned()
        .collect()
}

/// Score a single expert against an already lowercased description
pub fn score_expert(lowered_description: &str, patterns: &ExpertPatterns) -> KeywordScore {
    let matched_keywords = matches_in(lowered_description, &patterns.activation_keywords);
    let matched_boosters = matches_in(lowered_description, &patterns.confidence_boosters);
    let matched_negatives = matches_in(lowered_description, &patterns.negative_indicators);

    let raw = matched_keywords.len() as i32 * KEYWORD_POINTS
        + matched_boosters.len() as i32 * BOOSTER_POINTS
        - matched_negatives.len() as i32 * NEGATIVE_POINTS;

    KeywordScore {
        score: clamp_score(raw),
        matched_keywords,
        matched_boosters,
        matched_negatives,
    }
}

/// Score every expert of the pattern store independently
pub fn score_all(description: &str, store: &PatternStore) -> BTreeMap<Expert, KeywordScore> {
    let lowered = description.to_lowercase();
    store
        .experts
        .iter()
        .map(|(expert, patterns)| (expert.clone(), score_expert(&lowered, patterns)))
        .collect()
}
