//! Dashboard events
//!
//! Every decision and every feedback record can be mirrored to a dashboard as
//! a small JSON event. Emission is best effort: callers log and count a
//! failed publish, they never fail the routing call because of it.

pub mod mqtt;

pub use mqtt::MqttEventPublisher;

use crate::protocol::{FeedbackRecord, RoutingDecision};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub const ROUTING_DECISION_EVENT: &str = "routing_decision";
pub const FEEDBACK_RECORDED_EVENT: &str = "feedback_recorded";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to publish event: {0}")]
    PublishFailed(String),

    #[error("events not flushed within {0:?}")]
    FlushTimeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardEvent {
    pub event_id: Uuid,
    pub source: String,
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub payload: Value,
}

impl DashboardEvent {
    pub fn new<S: Into<String>, E: Into<String>, T: Into<String>>(
        source: S,
        event: E,
        task_id: T,
        payload: Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            source: source.into(),
            event: event.into(),
            timestamp: Utc::now(),
            task_id: task_id.into(),
            payload,
        }
    }

    pub fn routing_decision(source: &str, decision: &RoutingDecision) -> Self {
        let payload = json!({
            "primary_expert": decision.primary_expert.as_str(),
            "primary_confidence": decision.primary_confidence,
            "strategy": decision.strategy.as_str(),
            "routing_method": decision.routing_method.as_str(),
            "parallel_experts": decision
                .parallel_experts
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>(),
            "model": decision.model_recommendation.model,
            "tier": decision.model_recommendation.tier.as_str(),
        });
        Self::new(source, ROUTING_DECISION_EVENT, decision.task_id.clone(), payload)
    }

    pub fn feedback_recorded(source: &str, feedback: &FeedbackRecord) -> Self {
        let payload = json!({
            "expert": feedback.expert.as_str(),
            "outcome": feedback.outcome.as_str(),
            "score": feedback.score,
            "matched_keywords": feedback.matched_keywords,
        });
        Self::new(source, FEEDBACK_RECORDED_EVENT, feedback.task_id.clone(), payload)
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DashboardEvent) -> Result<(), EventError>;

    /// Deliver whatever is still queued, waiting at most `timeout`
    ///
    /// Called once before a short-lived process exits. Publishers that send
    /// synchronously have nothing to do.
    async fn flush(&self, _timeout: Duration) -> Result<(), EventError> {
        Ok(())
    }
}

/// Publisher used when no dashboard is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: &DashboardEvent) -> Result<(), EventError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Outcome;
    use crate::routing::expert::Expert;

    #[test]
    fn test_feedback_event_payload() {
        let feedback = FeedbackRecord::new(
            "task-7",
            Expert::Security,
            Outcome::Success,
            0.9,
            vec!["cve".to_string()],
        )
        .unwrap();
        let event = DashboardEvent::feedback_recorded("moe-router", &feedback);

        assert_eq!(event.event, FEEDBACK_RECORDED_EVENT);
        assert_eq!(event.task_id, "task-7");
        assert_eq!(event.payload["expert"], "security");
        assert_eq!(event.payload["outcome"], "success");
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = DashboardEvent::new("src", "x", "t", Value::Null);
        let b = DashboardEvent::new("src", "x", "t", Value::Null);
        assert_ne!(a.event_id, b.event_id);
    }

    #[tokio::test]
    async fn test_noop_publisher() {
        let event = DashboardEvent::new("src", "x", "t", Value::Null);
        assert!(NoopPublisher.publish(&event).await.is_ok());
        assert!(NoopPublisher.flush(Duration::from_millis(10)).await.is_ok());
    }
}
