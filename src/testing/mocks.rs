//! Mock implementations for testing
//!
//! Provides a scripted classifier, a recording event publisher, a fixed
//! complexity estimator and a sample pattern store so the router can be
//! exercised without classifier services or an MQTT broker.

use crate::classifiers::{Classification, Classifier, ClassifierError};
use crate::events::{DashboardEvent, EventError, EventPublisher};
use crate::routing::complexity::ComplexityEstimator;
use crate::routing::expert::Expert;
use crate::routing::patterns::PatternStore;
use crate::routing::snapshot::RoutingSnapshot;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Pattern store used across unit and integration tests
pub const SAMPLE_PATTERNS_JSON: &str = r#"{
  "thresholds": {
    "single_expert": 0.75,
    "multi_expert": 0.5,
    "minimum_activation": 0.3
  },
  "experts": {
    "development": {
      "activation_keywords": ["implement", "fix", "bug", "refactor", "code", "feature", "function", "endpoint"],
      "confidence_boosters": ["unit test", "api"],
      "negative_indicators": ["vulnerability", "deploy"]
    },
    "security": {
      "activation_keywords": ["security", "vulnerability", "cve", "authentication", "exploit", "credential"],
      "confidence_boosters": ["patch", "exposure", "investigate"],
      "negative_indicators": []
    },
    "inventory": {
      "activation_keywords": ["inventory", "asset", "list", "discover", "catalog"],
      "confidence_boosters": ["servers", "hosts"],
      "negative_indicators": []
    },
    "cicd": {
      "activation_keywords": ["pipeline", "deploy", "build", "release", "ci/cd"],
      "confidence_boosters": ["staging", "production"],
      "negative_indicators": []
    }
  }
}"#;

pub fn sample_patterns() -> PatternStore {
    PatternStore::from_json(SAMPLE_PATTERNS_JSON).expect("sample patterns are valid")
}

pub fn sample_snapshot() -> RoutingSnapshot {
    RoutingSnapshot::new(sample_patterns())
}

/// Classifier that replays a fixed answer and counts its calls
#[derive(Debug)]
pub struct MockClassifier {
    response: Result<Option<Classification>, ClassifierError>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn answering(expert: Expert, confidence: f64, method: &str) -> Self {
        Self {
            response: Ok(Some(Classification {
                expert,
                confidence,
                method: Some(method.to_string()),
                matched: true,
                matched_keywords: Vec::new(),
            })),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers with no opinion
    pub fn silent() -> Self {
        Self {
            response: Ok(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mark the scripted answer as not a match
    pub fn unmatched(mut self) -> Self {
        if let Ok(Some(ref mut classification)) = self.response {
            classification.matched = false;
        }
        self
    }

    /// Drop the reported method, as a service that does not say how it decided
    pub fn without_method(mut self) -> Self {
        if let Ok(Some(ref mut classification)) = self.response {
            classification.method = None;
        }
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        if let Ok(Some(ref mut classification)) = self.response {
            classification.matched_keywords = keywords.iter().map(|k| k.to_string()).collect();
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, _description: &str) -> Result<Option<Classification>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Publisher that keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    pub events: Arc<Mutex<Vec<DashboardEvent>>>,
    pub flushes: Arc<AtomicUsize>,
    pub should_fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn events(&self) -> Vec<DashboardEvent> {
        self.events.lock().await.clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DashboardEvent) -> Result<(), EventError> {
        if self.should_fail {
            return Err(EventError::PublishFailed("mock publisher failure".to_string()));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), EventError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(EventError::FlushTimeout(timeout));
        }
        Ok(())
    }
}

/// Estimator that always returns the same complexity
#[derive(Debug, Clone, Copy)]
pub struct FixedComplexity(pub u8);

impl ComplexityEstimator for FixedComplexity {
    fn estimate(&self, _description: &str) -> u8 {
        self.0
    }
}
