//! Dispatch strategy selection
//!
//! Scores arrive on the 0-100 scale. Confidence is `score / 100`; the margin
//! rule is evaluated in whole points so `0.20` never suffers rounding.

use crate::routing::expert::Expert;
use crate::routing::patterns::RoutingThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lead over the runner-up, in points, that forces single-expert dispatch
const MARGIN_POINTS: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SingleExpert,
    MultiExpertParallel,
    SingleExpertLowConfidence,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SingleExpert => "single_expert",
            Strategy::MultiExpertParallel => "multi_expert_parallel",
            Strategy::SingleExpertLowConfidence => "single_expert_low_confidence",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySelection {
    pub primary: Expert,
    pub primary_score: u8,
    pub strategy: Strategy,
    /// Experts at or above the minimum activation threshold, primary included
    pub activated: Vec<Expert>,
    pub parallel: Vec<Expert>,
    /// Primary score minus the best other activated score, in points
    pub margin_points: i32,
}

impl StrategySelection {
    pub fn primary_confidence(&self) -> f64 {
        to_confidence(self.primary_score)
    }
}

pub fn to_confidence(score: u8) -> f64 {
    f64::from(score) / 100.0
}

/// Highest score wins; ties go to the expert earliest in tie-break order
pub fn argmax(scores: &BTreeMap<Expert, u8>) -> Option<(&Expert, u8)> {
    let mut best: Option<(&Expert, u8)> = None;
    for (expert, &score) in scores {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((expert, score)),
        }
    }
    best
}

/// Select the dispatch strategy; `None` only when there is nothing to score
pub fn select(
    scores: &BTreeMap<Expert, u8>,
    thresholds: &RoutingThresholds,
) -> Option<StrategySelection> {
    let (primary, primary_score) = argmax(scores)?;
    let primary_confidence = to_confidence(primary_score);

    let activated: Vec<Expert> = scores
        .iter()
        .filter(|(_, &score)| to_confidence(score) >= thresholds.minimum_activation)
        .map(|(expert, _)| expert.clone())
        .collect();

    let runner_up = scores
        .iter()
        .filter(|(expert, _)| *expert != primary && activated.contains(expert))
        .map(|(_, &score)| score)
        .max()
        .unwrap_or(0);
    let margin_points = i32::from(primary_score) - i32::from(runner_up);

    let (strategy, parallel) = if primary_confidence >= thresholds.single_expert
        || margin_points >= MARGIN_POINTS
    {
        (Strategy::SingleExpert, Vec::new())
    } else if activated.len() > 1 {
        let parallel = activated
            .iter()
            .filter(|expert| *expert != primary)
            .cloned()
            .collect();
        (Strategy::MultiExpertParallel, parallel)
    } else {
        (Strategy::SingleExpertLowConfidence, Vec::new())
    };

    Some(StrategySelection {
        primary: primary.clone(),
        primary_score,
        strategy,
        activated,
        parallel,
        margin_points,
    })
}
