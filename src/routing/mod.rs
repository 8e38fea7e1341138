//! Routing pipeline
//!
//! Stages live in their own modules and are pure functions over a
//! [`RoutingSnapshot`](snapshot::RoutingSnapshot); [`ExpertRouter`] wires
//! them together with the classifier cascade, journals and dashboard.

pub mod access;
pub mod complexity;
pub mod expert;
pub mod explain;
pub mod model_tier;
pub mod patterns;
pub mod router;
pub mod scorer;
pub mod snapshot;
pub mod strategy;
pub mod type_override;
pub mod weights;

pub use access::{AccessPolicy, CallerIdentity};
pub use complexity::{ComplexityEstimator, KeywordComplexityEstimator};
pub use expert::Expert;
pub use model_tier::{ModelCatalog, ModelRecommendation, ModelTier, SensitivityLevel};
pub use patterns::{PatternStore, RoutingThresholds};
pub use router::{ExpertRouter, Router, EVENT_FLUSH_TIMEOUT};
pub use snapshot::{RoutingSnapshot, SnapshotSources, SnapshotStore};
pub use strategy::Strategy;
pub use weights::{LearnedWeights, UtilityWeights, WeightAdjuster};
