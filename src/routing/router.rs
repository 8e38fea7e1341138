//! Expert router: the routing pipeline end to end
//!
//! ```text
//! permission gate -> complexity gate -> keyword baseline -> cascade
//!   -> weight adjustment -> type override -> strategy -> model tier
//!   -> decision log + dashboard event
//! ```
//!
//! Every call that passes the permission gate yields a decision. Internal
//! failures past the gate produce the `coordinator` fallback instead of an
//! error; only [`RouterError::is_fatal`] errors reach the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use moe_router::config::RouterConfig;
//! use moe_router::protocol::Task;
//! use moe_router::routing::{CallerIdentity, ExpertRouter, Router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RouterConfig::load_from_file(std::path::Path::new("moe-router.toml"))?;
//! let router = ExpertRouter::from_config(&config)?;
//!
//! let task = Task::new("task-1", "Fix security vulnerability in authentication module");
//! let decision = router.route(&task, &CallerIdentity::local()).await?;
//! println!("{} ({:.2})", decision.primary_expert, decision.primary_confidence);
//! # Ok(())
//! # }
//! ```

use crate::classifiers::{CascadeHit, CascadeLayer, ClassifierCascade};
use crate::config::{CicdPlacement, RouterConfig, RoutingSection};
use crate::error::{RouterError, RouterResult};
use crate::events::{DashboardEvent, EventPublisher, MqttEventPublisher, NoopPublisher};
use crate::journal::{DecisionLog, FeedbackLog};
use crate::observability::metrics;
use crate::protocol::{FeedbackRecord, Outcome, RoutingDecision, RoutingMethod, Task};
use crate::routing::access::{AccessPolicy, CallerIdentity};
use crate::routing::complexity::{ComplexityEstimator, KeywordComplexityEstimator};
use crate::routing::expert::Expert;
use crate::routing::explain::{explain, Basis};
use crate::routing::model_tier;
use crate::routing::scorer::{clamp_score, score_all};
use crate::routing::snapshot::{RoutingSnapshot, SnapshotSources, SnapshotStore};
use crate::routing::strategy::{self, to_confidence, Strategy};
use crate::routing::type_override::{self, OVERRIDE_SCORE};
use crate::routing::weights::{description_words, WeightAdjuster};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Confidence of the fallback decision
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Default `source` of dashboard events
pub const DEFAULT_EVENT_SOURCE: &str = "moe-router";

/// How long a one-shot process waits for queued dashboard events
pub const EVENT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Routes one task to one or more experts
#[async_trait]
pub trait Router: Send + Sync {
    /// Produce a routing decision for `task` on behalf of `caller`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the caller may not read the pattern store and
    /// `InvalidInput` for a task without an id. Nothing else is returned as
    /// an error.
    async fn route(&self, task: &Task, caller: &CallerIdentity) -> RouterResult<RoutingDecision>;
}

pub struct ExpertRouter {
    snapshots: SnapshotStore,
    cascade: ClassifierCascade,
    complexity: Arc<dyn ComplexityEstimator>,
    weights: WeightAdjuster,
    access: AccessPolicy,
    routing: RoutingSection,
    decision_log: Option<DecisionLog>,
    feedback_log: Option<FeedbackLog>,
    publisher: Arc<dyn EventPublisher>,
    event_source: String,
}

impl ExpertRouter {
    /// Router over `snapshots` with no external layers, journals or dashboard
    pub fn new(snapshots: SnapshotStore) -> Self {
        Self {
            snapshots,
            cascade: ClassifierCascade::default(),
            complexity: Arc::new(KeywordComplexityEstimator),
            weights: WeightAdjuster::default(),
            access: AccessPolicy::allow_all(),
            routing: RoutingSection::default(),
            decision_log: None,
            feedback_log: None,
            publisher: Arc::new(NoopPublisher),
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
        }
    }

    /// Build everything from a loaded configuration
    ///
    /// Must run inside a tokio runtime when the dashboard is enabled. A
    /// dashboard that cannot be set up is logged and replaced by a no-op
    /// publisher.
    pub fn from_config(config: &RouterConfig) -> RouterResult<Self> {
        let snapshots = SnapshotStore::load(SnapshotSources::from(&config.stores))?;

        let mut router = Self::new(snapshots)
            .with_cascade(ClassifierCascade::from_config(config))
            .with_weights(WeightAdjuster::new(
                config.routing.learned_weights_enabled,
                config.routing.utility_weights_enabled,
            ))
            .with_access(AccessPolicy::from_config(
                &config.access,
                config.stores.patterns.clone(),
            ))
            .with_routing(config.routing.clone());

        if let Some(ref path) = config.journal.decision_log {
            router = router.with_decision_log(DecisionLog::new(path));
        }
        if let Some(ref dir) = config.journal.feedback_dir {
            router = router.with_feedback_log(FeedbackLog::new(dir));
        }

        if let Some(dashboard) = config.dashboard.as_ref().filter(|d| d.enabled) {
            match MqttEventPublisher::connect(dashboard) {
                Ok(publisher) => {
                    router = router
                        .with_publisher(Arc::new(publisher))
                        .with_event_source(dashboard.source.clone());
                }
                Err(e) => {
                    warn!(error = %e, "Dashboard publisher unavailable, events disabled");
                }
            }
        }

        Ok(router)
    }

    pub fn with_cascade(mut self, cascade: ClassifierCascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_complexity_estimator(mut self, estimator: Arc<dyn ComplexityEstimator>) -> Self {
        self.complexity = estimator;
        self
    }

    pub fn with_weights(mut self, weights: WeightAdjuster) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_routing(mut self, routing: RoutingSection) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_decision_log(mut self, log: DecisionLog) -> Self {
        self.decision_log = Some(log);
        self
    }

    pub fn with_feedback_log(mut self, log: FeedbackLog) -> Self {
        self.feedback_log = Some(log);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_event_source<S: Into<String>>(mut self, source: S) -> Self {
        self.event_source = source.into();
        self
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Rebuild the snapshot from disk; calls in flight keep the old one
    pub fn reload(&self) -> RouterResult<()> {
        self.snapshots.reload().map(|_| ())
    }

    /// Append an outcome for the learning job and mirror it to the dashboard
    ///
    /// Only invalid input is an error; journal and dashboard failures are
    /// logged and counted.
    pub async fn record_feedback(
        &self,
        task_id: &str,
        expert: Expert,
        outcome: Outcome,
        score: f64,
        matched_keywords: Vec<String>,
    ) -> RouterResult<FeedbackRecord> {
        let record = FeedbackRecord::new(task_id, expert, outcome, score, matched_keywords)?;

        if let Some(ref log) = self.feedback_log {
            match log.append(&record).await {
                Ok(()) => metrics().feedback_recorded(),
                Err(e) => {
                    metrics().feedback_log_failed();
                    warn!(task_id, error = %e.sanitized_message(), "Failed to append feedback");
                }
            }
        }

        self.emit(DashboardEvent::feedback_recorded(&self.event_source, &record))
            .await;
        info!(task_id, expert = %record.expert, outcome = %record.outcome, "Feedback recorded");
        Ok(record)
    }

    /// Deliver queued dashboard events before the process exits
    ///
    /// Bounded by `timeout`; a failure is logged, never returned.
    pub async fn flush_events(&self, timeout: Duration) {
        if let Err(e) = self.publisher.flush(timeout).await {
            metrics().event_publish_failed();
            warn!(error = %e, "Dashboard events not flushed");
        }
    }

    async fn decide(&self, task: &Task, snapshot: &RoutingSnapshot) -> RouterResult<RoutingDecision> {
        let description = task.description.as_str();

        if self.routing.complexity_gate_enabled {
            let complexity = self.complexity.estimate(description);
            if complexity > self.routing.complexity_threshold {
                debug!(complexity, threshold = self.routing.complexity_threshold, "Complexity gate tripped");
                return Ok(self.complexity_decision(task, snapshot, complexity));
            }
        }

        let baseline = score_all(description, &snapshot.patterns);
        let mut scores: BTreeMap<Expert, u8> = baseline
            .iter()
            .map(|(expert, score)| (expert.clone(), score.score))
            .collect();

        let hit = self.cascade.run(description, &snapshot.patterns).await;
        let cascade_slot = hit.as_ref().map(|hit| {
            let slot = self.cascade_slot(hit);
            let score = clamp_score((hit.classification.confidence * 100.0).round() as i32);
            scores.insert(slot.clone(), score);
            slot
        });

        let words = description_words(description);
        let mut scores =
            self.weights
                .adjust_all(&scores, &words, &snapshot.learned, &snapshot.utility);

        let mut raised_by_type = None;
        if let Some(detected) = type_override::detect(description) {
            let slot = scores.entry(detected.expert.clone()).or_insert(0);
            if *slot < OVERRIDE_SCORE {
                *slot = OVERRIDE_SCORE;
                raised_by_type = Some(detected.expert);
            }
        }

        let selection = strategy::select(&scores, &snapshot.patterns.thresholds)
            .ok_or_else(|| RouterError::internal_error("pattern store defines no experts"))?;

        let method = match hit.as_ref() {
            _ if raised_by_type.as_ref() == Some(&selection.primary) => {
                RoutingMethod::TypeClassification
            }
            Some(hit) if cascade_slot.as_ref() == Some(&selection.primary) => {
                hit.layer.routing_method()
            }
            _ => RoutingMethod::Keyword,
        };

        let no_keywords: &[String] = &[];
        let basis = match (method, hit.as_ref()) {
            (RoutingMethod::TypeClassification, _) => Basis::TypeClassification,
            (_, Some(hit)) if cascade_slot.as_ref() == Some(&selection.primary) => {
                Basis::Keywords(&hit.classification.matched_keywords)
            }
            _ => Basis::Keywords(
                baseline
                    .get(&selection.primary)
                    .map(|s| s.matched_keywords.as_slice())
                    .unwrap_or(no_keywords),
            ),
        };

        let primary_confidence = selection.primary_confidence();
        let explanation = explain(
            &selection.primary,
            primary_confidence,
            &basis,
            selection.strategy,
            &selection.parallel,
            method,
        );

        Ok(RoutingDecision {
            task_id: task.id.clone(),
            timestamp: Utc::now(),
            primary_expert: selection.primary,
            primary_confidence,
            strategy: selection.strategy,
            scores: scores
                .iter()
                .map(|(expert, score)| (expert.clone(), to_confidence(*score)))
                .collect(),
            parallel_experts: selection.parallel,
            activated_experts: selection.activated,
            explanation,
            routing_method: method,
            model_recommendation: model_tier::recommend(description, &snapshot.catalog),
        })
    }

    /// Score slot a qualifying cascade answer replaces
    fn cascade_slot(&self, hit: &CascadeHit) -> Expert {
        let expert = &hit.classification.expert;
        if hit.layer == CascadeLayer::Nlp
            && *expert == Expert::Cicd
            && self.routing.cicd_placement == CicdPlacement::Fold
        {
            Expert::Development
        } else {
            expert.clone()
        }
    }

    fn complexity_decision(
        &self,
        task: &Task,
        snapshot: &RoutingSnapshot,
        complexity: u8,
    ) -> RoutingDecision {
        self.reserved_decision(
            task,
            snapshot,
            Expert::Initializer,
            1.0,
            Strategy::SingleExpert,
            &Basis::Complexity(complexity),
            RoutingMethod::ComplexityBased,
        )
    }

    fn fallback_decision(&self, task: &Task, snapshot: &RoutingSnapshot, reason: &str) -> RoutingDecision {
        self.reserved_decision(
            task,
            snapshot,
            Expert::Coordinator,
            FALLBACK_CONFIDENCE,
            Strategy::SingleExpertLowConfidence,
            &Basis::Fallback(reason),
            RoutingMethod::Fallback,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn reserved_decision(
        &self,
        task: &Task,
        snapshot: &RoutingSnapshot,
        expert: Expert,
        confidence: f64,
        strategy: Strategy,
        basis: &Basis<'_>,
        method: RoutingMethod,
    ) -> RoutingDecision {
        RoutingDecision {
            task_id: task.id.clone(),
            timestamp: Utc::now(),
            primary_expert: expert.clone(),
            primary_confidence: confidence,
            strategy,
            scores: BTreeMap::from([(expert.clone(), confidence)]),
            parallel_experts: Vec::new(),
            activated_experts: vec![expert.clone()],
            explanation: explain(&expert, confidence, basis, strategy, &[], method),
            routing_method: method,
            model_recommendation: model_tier::recommend(&task.description, &snapshot.catalog),
        }
    }

    async fn record_decision(&self, decision: &RoutingDecision) {
        if let Some(ref log) = self.decision_log {
            if let Err(e) = log.append(&decision.to_record()).await {
                metrics().decision_log_failed();
                warn!(
                    task_id = %decision.task_id,
                    error = %e.sanitized_message(),
                    "Failed to append routing decision"
                );
            }
        }

        self.emit(DashboardEvent::routing_decision(&self.event_source, decision))
            .await;
    }

    async fn emit(&self, event: DashboardEvent) {
        match self.publisher.publish(&event).await {
            Ok(()) => metrics().event_published(),
            Err(e) => {
                metrics().event_publish_failed();
                warn!(event = %event.event, task_id = %event.task_id, error = %e, "Dashboard event not published");
            }
        }
    }
}

#[async_trait]
impl Router for ExpertRouter {
    async fn route(&self, task: &Task, caller: &CallerIdentity) -> RouterResult<RoutingDecision> {
        task.validate()?;
        let span = crate::route_span!(task_id = %task.id, caller = %caller);

        async {
            let started = Instant::now();

            if let Err(e) = self.access.check(caller) {
                metrics().permission_denied();
                warn!(error = %e.sanitized_message(), "Routing refused");
                return Err(e);
            }

            let snapshot = self.snapshots.current();
            let decision = match self.decide(task, &snapshot).await {
                Ok(decision) => decision,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    metrics().fallback_used();
                    warn!(error = %e.sanitized_message(), "Routing failed, using fallback expert");
                    self.fallback_decision(task, &snapshot, "routing failed")
                }
            };

            metrics().decision_recorded(
                decision.routing_method.as_str(),
                decision.strategy.as_str(),
                started.elapsed(),
            );
            info!(
                expert = %decision.primary_expert,
                confidence = decision.primary_confidence,
                strategy = %decision.strategy,
                method = %decision.routing_method,
                "Task routed"
            );

            self.record_decision(&decision).await;
            Ok(decision)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::ClassifierError;
    use crate::routing::patterns::PatternStore;
    use crate::testing::mocks::{
        sample_snapshot, FixedComplexity, MockClassifier, RecordingPublisher,
    };

    fn router() -> ExpertRouter {
        ExpertRouter::new(SnapshotStore::new(sample_snapshot()))
    }

    async fn route(router: &ExpertRouter, description: &str) -> RoutingDecision {
        router
            .route(&Task::new("t-1", description), &CallerIdentity::local())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_keyword_routing_single_expert() {
        let decision = route(&router(), "Fix security vulnerability in authentication module").await;

        assert_eq!(decision.primary_expert, Expert::Security);
        assert_eq!(decision.primary_confidence, 0.75);
        assert_eq!(decision.strategy, Strategy::SingleExpert);
        assert_eq!(decision.routing_method, RoutingMethod::Keyword);
        assert!(decision.explanation.contains("keywords: security, vulnerability, authentication"));
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let decision = route(&router(), "What time is it?").await;

        assert_eq!(decision.primary_expert, Expert::Development);
        assert_eq!(decision.primary_confidence, 0.0);
        assert_eq!(decision.strategy, Strategy::SingleExpertLowConfidence);
        assert!(decision.scores.values().all(|score| *score == 0.0));
        assert!(decision.explanation.contains("best available match"));
    }

    #[tokio::test]
    async fn test_complexity_gate_short_circuits() {
        let router = router().with_complexity_estimator(Arc::new(FixedComplexity(7)));
        let decision = route(&router, "anything").await;

        assert_eq!(decision.primary_expert, Expert::Initializer);
        assert_eq!(decision.primary_confidence, 1.0);
        assert_eq!(decision.routing_method, RoutingMethod::ComplexityBased);
        assert!(decision.explanation.contains("task decomposition required"));
    }

    #[tokio::test]
    async fn test_complexity_at_threshold_does_not_trip() {
        let router = router().with_complexity_estimator(Arc::new(FixedComplexity(3)));
        let decision = route(&router, "What time is it?").await;
        assert_ne!(decision.primary_expert, Expert::Initializer);
    }

    #[tokio::test]
    async fn test_complexity_gate_can_be_disabled() {
        let routing = RoutingSection {
            complexity_gate_enabled: false,
            ..Default::default()
        };
        let router = router()
            .with_complexity_estimator(Arc::new(FixedComplexity(10)))
            .with_routing(routing);
        let decision = route(&router, "What time is it?").await;
        assert_eq!(decision.routing_method, RoutingMethod::Keyword);
    }

    #[tokio::test]
    async fn test_type_override_wins() {
        let decision = route(&router(), "build: run CI pipeline and deploy to staging").await;

        assert_eq!(decision.primary_expert, Expert::Cicd);
        assert_eq!(decision.primary_confidence, 0.95);
        assert_eq!(decision.routing_method, RoutingMethod::TypeClassification);
        assert!(decision.explanation.contains("type classification"));
    }

    #[tokio::test]
    async fn test_nlp_cicd_folds_into_development() {
        let nlp = Arc::new(MockClassifier::answering(Expert::Cicd, 0.9, "hybrid"));
        let router = router().with_cascade(ClassifierCascade::default().with_nlp(nlp));
        let decision = route(&router, "get the release out the door").await;

        assert_eq!(decision.primary_expert, Expert::Development);
        assert_eq!(decision.primary_confidence, 0.9);
        assert_eq!(decision.routing_method, RoutingMethod::NlpHybrid);
    }

    #[tokio::test]
    async fn test_nlp_cicd_dedicated_slot() {
        let nlp = Arc::new(MockClassifier::answering(Expert::Cicd, 0.9, "hybrid"));
        let routing = RoutingSection {
            cicd_placement: CicdPlacement::Dedicated,
            ..Default::default()
        };
        let router = router()
            .with_cascade(ClassifierCascade::default().with_nlp(nlp))
            .with_routing(routing);
        let decision = route(&router, "get the release out the door").await;

        assert_eq!(decision.primary_expert, Expert::Cicd);
        assert_eq!(decision.primary_confidence, 0.9);
    }

    #[tokio::test]
    async fn test_semantic_layer_after_failed_nlp() {
        let nlp = Arc::new(MockClassifier::failing(ClassifierError::Timeout(
            std::time::Duration::from_secs(30),
        )));
        let semantic = Arc::new(
            MockClassifier::answering(Expert::Inventory, 0.82, "semantic").with_keywords(&["hosts"]),
        );
        let router = router().with_cascade(
            ClassifierCascade::default()
                .with_nlp(nlp)
                .with_semantic(semantic),
        );
        let decision = route(&router, "which machines do we run").await;

        assert_eq!(decision.primary_expert, Expert::Inventory);
        assert_eq!(decision.routing_method, RoutingMethod::Semantic);
        assert!(decision.explanation.contains("keywords: hosts"));
    }

    #[tokio::test]
    async fn test_outvoted_cascade_answer_is_not_credited() {
        let nlp = Arc::new(MockClassifier::answering(Expert::Inventory, 0.7, "hybrid"));
        let router = router().with_cascade(ClassifierCascade::default().with_nlp(nlp));
        let decision = route(&router, "Fix security vulnerability in authentication module").await;

        assert_eq!(decision.primary_expert, Expert::Security);
        assert_eq!(decision.scores[&Expert::Inventory], 0.7);
        assert_eq!(decision.routing_method, RoutingMethod::Keyword);
        assert!(!decision.explanation.contains("nlp-hybrid"));
        assert!(decision.explanation.contains("keywords: security, vulnerability, authentication"));
    }

    #[tokio::test]
    async fn test_permission_denied_is_fatal() {
        let router = router().with_access(AccessPolicy::new(vec!["ops".to_string()], None));
        let result = router
            .route(&Task::new("t-1", "anything"), &CallerIdentity::new("intruder"))
            .await;
        assert!(matches!(result, Err(RouterError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_empty_pattern_store_falls_back() {
        let router = ExpertRouter::new(SnapshotStore::new(RoutingSnapshot::new(
            PatternStore::default(),
        )));
        let decision = route(&router, "What time is it?").await;

        assert_eq!(decision.primary_expert, Expert::Coordinator);
        assert_eq!(decision.primary_confidence, FALLBACK_CONFIDENCE);
        assert_eq!(decision.routing_method, RoutingMethod::Fallback);
        assert_eq!(decision.strategy, Strategy::SingleExpertLowConfidence);
    }

    #[tokio::test]
    async fn test_decision_event_published() {
        let publisher = RecordingPublisher::new();
        let router = router().with_publisher(Arc::new(publisher.clone()));
        route(&router, "list inventory of servers").await;

        let events = publisher.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "routing_decision");
        assert_eq!(events[0].payload["primary_expert"], "inventory");
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let router = router().with_publisher(Arc::new(RecordingPublisher::with_failure()));
        let decision = route(&router, "list inventory of servers").await;
        assert_eq!(decision.primary_expert, Expert::Inventory);
    }

    #[tokio::test]
    async fn test_flush_events_reaches_publisher() {
        let publisher = RecordingPublisher::new();
        let healthy = router().with_publisher(Arc::new(publisher.clone()));
        route(&healthy, "list inventory of servers").await;
        healthy.flush_events(EVENT_FLUSH_TIMEOUT).await;
        assert_eq!(publisher.flushes(), 1);

        let failing = RecordingPublisher::with_failure();
        let broken = router().with_publisher(Arc::new(failing.clone()));
        broken.flush_events(Duration::from_millis(10)).await;
        assert_eq!(failing.flushes(), 1);
    }

    #[tokio::test]
    async fn test_record_feedback_rejects_empty_task_id() {
        let result = router()
            .record_feedback("", Expert::Security, Outcome::Success, 1.0, Vec::new())
            .await;
        assert!(matches!(result, Err(RouterError::InvalidInput { .. })));
    }
}
