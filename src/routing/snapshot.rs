//! Immutable routing snapshots and atomic reload
//!
//! A routing call clones the current `Arc<RoutingSnapshot>` once and works on
//! it to the end, so a concurrent reload is never observed half-applied.

use crate::config::{ConfigError, StoresSection};
use crate::error::{RouterError, RouterResult};
use crate::routing::model_tier::ModelCatalog;
use crate::routing::patterns::PatternStore;
use crate::routing::weights::{LearnedWeights, UtilityWeights};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Everything a routing call reads, loaded together
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    pub patterns: PatternStore,
    pub learned: LearnedWeights,
    pub utility: UtilityWeights,
    pub catalog: ModelCatalog,
    pub loaded_at: DateTime<Utc>,
}

impl RoutingSnapshot {
    pub fn new(patterns: PatternStore) -> Self {
        Self {
            patterns,
            learned: LearnedWeights::default(),
            utility: UtilityWeights::default(),
            catalog: ModelCatalog::default(),
            loaded_at: Utc::now(),
        }
    }

    pub fn with_learned(mut self, learned: LearnedWeights) -> Self {
        self.learned = learned;
        self
    }

    pub fn with_utility(mut self, utility: UtilityWeights) -> Self {
        self.utility = utility;
        self
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Load every store; only the pattern store is mandatory
    pub fn load(sources: &SnapshotSources) -> RouterResult<Self> {
        let patterns = PatternStore::load(&sources.patterns).map_err(|e| match e {
            ConfigError::StoreNotFound(path) => RouterError::config_missing(format!(
                "pattern store not found at {}",
                path.display()
            )),
            other => RouterError::Config(other),
        })?;

        let learned = load_optional(sources.learned_weights.as_deref(), "learned weights", |p| {
            LearnedWeights::load(p)
        })?;
        let utility = load_optional(
            sources.utility_weights_dir.as_deref(),
            "utility weights directory",
            UtilityWeights::load_latest,
        )?;
        let catalog = load_optional(sources.model_catalog.as_deref(), "model catalog", |p| {
            ModelCatalog::load(p)
        })?;

        Ok(Self {
            patterns,
            learned,
            utility,
            catalog,
            loaded_at: Utc::now(),
        })
    }
}

fn load_optional<T, F>(path: Option<&Path>, what: &str, load: F) -> RouterResult<T>
where
    T: Default,
    F: FnOnce(&Path) -> Result<T, ConfigError>,
{
    match path {
        None => Ok(T::default()),
        Some(path) if !path.exists() => {
            warn!(path = %path.display(), "No {what} found, using defaults");
            Ok(T::default())
        }
        Some(path) => load(path).map_err(RouterError::Config),
    }
}

/// Paths the snapshot is (re)built from
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSources {
    pub patterns: PathBuf,
    pub learned_weights: Option<PathBuf>,
    pub utility_weights_dir: Option<PathBuf>,
    pub model_catalog: Option<PathBuf>,
}

impl From<&StoresSection> for SnapshotSources {
    fn from(stores: &StoresSection) -> Self {
        Self {
            patterns: stores.patterns.clone(),
            learned_weights: stores.learned_weights.clone(),
            utility_weights_dir: stores.utility_weights_dir.clone(),
            model_catalog: stores.model_catalog.clone(),
        }
    }
}

/// Shared holder of the current snapshot
#[derive(Debug)]
pub struct SnapshotStore {
    sources: Option<SnapshotSources>,
    current: RwLock<Arc<RoutingSnapshot>>,
}

impl SnapshotStore {
    /// In-memory store without backing files; `reload` is a no-op
    pub fn new(snapshot: RoutingSnapshot) -> Self {
        Self {
            sources: None,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn load(sources: SnapshotSources) -> RouterResult<Self> {
        let snapshot = RoutingSnapshot::load(&sources)?;
        info!(
            patterns = %sources.patterns.display(),
            experts = snapshot.patterns.experts.len(),
            utility_version = snapshot.utility.version.as_deref().unwrap_or("none"),
            "Routing snapshot loaded"
        );
        Ok(Self {
            sources: Some(sources),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn sources(&self) -> Option<&SnapshotSources> {
        self.sources.as_ref()
    }

    pub fn current(&self) -> Arc<RoutingSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a fully built snapshot
    pub fn replace(&self, snapshot: RoutingSnapshot) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// Rebuild from disk and swap; on failure the previous snapshot stays
    pub fn reload(&self) -> RouterResult<Arc<RoutingSnapshot>> {
        let Some(ref sources) = self.sources else {
            return Ok(self.current());
        };

        match RoutingSnapshot::load(sources) {
            Ok(snapshot) => {
                info!(
                    experts = snapshot.patterns.experts.len(),
                    utility_version = snapshot.utility.version.as_deref().unwrap_or("none"),
                    "Routing snapshot reloaded"
                );
                self.replace(snapshot);
                Ok(self.current())
            }
            Err(e) => {
                warn!(error = %e, "Snapshot reload failed, keeping previous snapshot");
                Err(e)
            }
        }
    }
}
