//! MoE Router
//!
//! Routes a task description to one or more specialist worker pools
//! ("experts") and recommends a model tier for running it.
//!
//! # Overview
//!
//! A routing call runs a fixed pipeline over an immutable snapshot of the
//! pattern, learned-weight and utility-weight stores:
//! - Permission gate and complexity gate
//! - Keyword/booster/negative baseline scoring
//! - External NLP and semantic classifiers, tried in order
//! - Learned and utility weight adjustment, then the type-prefix override
//! - Strategy selection and model tier recommendation
//!
//! Each decision is appended to a JSON Lines audit log and optionally
//! mirrored to a dashboard over MQTT.
//!
//! # Quick Start
//!
//! ```rust
//! use moe_router::protocol::{RoutingMethod, Task};
//! use moe_router::routing::{CallerIdentity, Expert, ExpertRouter, Router, SnapshotStore};
//! use moe_router::testing::sample_snapshot;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), moe_router::RouterError> {
//! let router = ExpertRouter::new(SnapshotStore::new(sample_snapshot()));
//! let task = Task::new("task-1", "cve-2024-1234: investigate exposure");
//!
//! let decision = router.route(&task, &CallerIdentity::local()).await?;
//! assert_eq!(decision.primary_expert, Expert::Security);
//! assert_eq!(decision.routing_method, RoutingMethod::TypeClassification);
//! # Ok(())
//! # }
//! ```

pub mod classifiers;
pub mod config;
pub mod error;
pub mod events;
pub mod journal;
pub mod observability;
pub mod protocol;
pub mod routing;
pub mod testing;

pub use config::{ConfigError, RouterConfig};
pub use error::{RouterError, RouterResult};
pub use protocol::*;
pub use routing::{CallerIdentity, Expert, ExpertRouter, Router};
