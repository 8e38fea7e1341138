//! Complexity gate estimator
//!
//! The gate asks whether a task is too large for a single specialist. Its
//! scale starts low so an ordinary description never trips the default
//! threshold of 3.

use crate::routing::model_tier::HIGH_COMPLEXITY_KEYWORDS;

pub const MIN_COMPLEXITY: u8 = 1;
pub const MAX_COMPLEXITY: u8 = 10;

const LONG_DESCRIPTION_WORDS: usize = 60;
const VERY_LONG_DESCRIPTION_WORDS: usize = 150;

/// Estimates task complexity on a 1-10 scale
pub trait ComplexityEstimator: Send + Sync {
    fn estimate(&self, description: &str) -> u8;
}

/// Keyword and length heuristic
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordComplexityEstimator;

impl ComplexityEstimator for KeywordComplexityEstimator {
    fn estimate(&self, description: &str) -> u8 {
        let lowered = description.to_lowercase();
        let keyword_hits = HIGH_COMPLEXITY_KEYWORDS
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .count();

        let word_count = description.split_whitespace().count();
        let length_bonus = usize::from(word_count > LONG_DESCRIPTION_WORDS)
            + usize::from(word_count > VERY_LONG_DESCRIPTION_WORDS);

        let raw = usize::from(MIN_COMPLEXITY) + keyword_hits + length_bonus;
        raw.clamp(usize::from(MIN_COMPLEXITY), usize::from(MAX_COMPLEXITY)) as u8
    }
}
