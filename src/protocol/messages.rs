//! Task, decision and feedback records
//!
//! `RoutingDecision` is the in-process result of routing. `DecisionRecord` is
//! its compact wire form, one JSON object per decision log line.

use crate::error::{RouterError, RouterResult};
use crate::routing::expert::Expert;
use crate::routing::model_tier::ModelRecommendation;
use crate::routing::strategy::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Value of `routing_strategy` on every decision record
pub const ROUTING_STRATEGY: &str = "mixture_of_experts";

/// A unit of work to be routed
///
/// # Examples
/// ```
/// use moe_router::protocol::Task;
///
/// let task = Task::new("task-42", "cve-2024-1234: investigate exposure");
/// assert_eq!(task.id, "task-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Free text, optionally prefixed with `type:`
    pub description: String,
}

impl Task {
    pub fn new<I: Into<String>, D: Into<String>>(id: I, description: D) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> RouterResult<()> {
        if self.id.trim().is_empty() {
            return Err(RouterError::invalid_input("task id must not be empty"));
        }
        Ok(())
    }
}

/// Which stage decided the primary expert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMethod {
    ComplexityBased,
    NlpHybrid,
    Semantic,
    Keyword,
    TypeClassification,
    Fallback,
}

impl RoutingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMethod::ComplexityBased => "complexity-based",
            RoutingMethod::NlpHybrid => "nlp-hybrid",
            RoutingMethod::Semantic => "semantic",
            RoutingMethod::Keyword => "keyword",
            RoutingMethod::TypeClassification => "type-classification",
            RoutingMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RoutingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of routing one task; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub primary_expert: Expert,
    /// 0.0-1.0
    pub primary_confidence: f64,
    pub strategy: Strategy,
    /// 0.0-1.0 per scored expert
    pub scores: BTreeMap<Expert, f64>,
    pub parallel_experts: Vec<Expert>,
    /// Experts at or above the minimum activation threshold
    pub activated_experts: Vec<Expert>,
    pub explanation: String,
    pub routing_method: RoutingMethod,
    pub model_recommendation: ModelRecommendation,
}

impl RoutingDecision {
    pub fn to_record(&self) -> DecisionRecord {
        DecisionRecord::from(self)
    }
}

/// One decision log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub routing_strategy: String,
    pub routing_method: RoutingMethod,
    pub decision: DecisionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionBody {
    pub primary_expert: String,
    pub primary_confidence: f64,
    pub strategy: Strategy,
    pub parallel_experts: Vec<String>,
    pub scores: BTreeMap<String, f64>,
    pub explanation: String,
    pub model_recommendation: ModelRecommendation,
}

impl From<&RoutingDecision> for DecisionRecord {
    fn from(decision: &RoutingDecision) -> Self {
        Self {
            task_id: decision.task_id.clone(),
            timestamp: decision.timestamp,
            routing_strategy: ROUTING_STRATEGY.to_string(),
            routing_method: decision.routing_method,
            decision: DecisionBody {
                primary_expert: decision.primary_expert.to_string(),
                primary_confidence: decision.primary_confidence,
                strategy: decision.strategy,
                parallel_experts: decision
                    .parallel_experts
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                scores: decision
                    .scores
                    .iter()
                    .map(|(expert, score)| (expert.to_string(), *score))
                    .collect(),
                explanation: decision.explanation.clone(),
                model_recommendation: decision.model_recommendation.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            other => Err(RouterError::invalid_input(format!(
                "outcome must be 'success' or 'failure', got '{other}'"
            ))),
        }
    }
}

/// Outcome of a routed task, reported after the fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub expert: Expert,
    pub outcome: Outcome,
    pub score: f64,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

impl FeedbackRecord {
    pub fn new<I: Into<String>>(
        task_id: I,
        expert: Expert,
        outcome: Outcome,
        score: f64,
        matched_keywords: Vec<String>,
    ) -> RouterResult<Self> {
        let task_id = task_id.into();
        if task_id.trim().is_empty() {
            return Err(RouterError::invalid_input("task id must not be empty"));
        }
        if !score.is_finite() {
            return Err(RouterError::invalid_input(format!(
                "feedback score must be a finite number, got {score}"
            )));
        }

        Ok(Self {
            task_id,
            timestamp: Utc::now(),
            expert,
            outcome,
            score,
            matched_keywords,
        })
    }
}
