//! Ordered external classifier layers
//!
//! NLP first, then semantic. Layers run one after the other and the first
//! qualifying answer wins. Any layer failure only means "no result".

use crate::classifiers::{from_endpoint, Classification, Classifier};
use crate::config::RouterConfig;
use crate::observability::metrics;
use crate::protocol::RoutingMethod;
use crate::routing::expert::Expert;
use crate::routing::patterns::PatternStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

pub const DEFAULT_NLP_THRESHOLD: f64 = 0.7;
pub const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.6;

/// Method a semantic answer must report to qualify
pub const SEMANTIC_METHOD: &str = "semantic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeLayer {
    Nlp,
    Semantic,
}

impl CascadeLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeLayer::Nlp => "nlp",
            CascadeLayer::Semantic => "semantic",
        }
    }

    pub fn routing_method(&self) -> RoutingMethod {
        match self {
            CascadeLayer::Nlp => RoutingMethod::NlpHybrid,
            CascadeLayer::Semantic => RoutingMethod::Semantic,
        }
    }
}

impl fmt::Display for CascadeLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The qualifying answer and the layer that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeHit {
    pub layer: CascadeLayer,
    pub classification: Classification,
}

pub struct ClassifierCascade {
    nlp: Option<Arc<dyn Classifier>>,
    semantic: Option<Arc<dyn Classifier>>,
    nlp_threshold: f64,
    semantic_threshold: f64,
}

impl Default for ClassifierCascade {
    fn default() -> Self {
        Self::new(DEFAULT_NLP_THRESHOLD, DEFAULT_SEMANTIC_THRESHOLD)
    }
}

impl ClassifierCascade {
    pub fn new(nlp_threshold: f64, semantic_threshold: f64) -> Self {
        Self {
            nlp: None,
            semantic: None,
            nlp_threshold,
            semantic_threshold,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        let mut cascade = Self::new(
            config.routing.nlp_confidence_threshold,
            config.routing.semantic_confidence_threshold,
        );
        if let Some(ref endpoint) = config.classifiers.nlp {
            cascade.nlp = Some(from_endpoint(endpoint));
        }
        if let Some(ref endpoint) = config.classifiers.semantic {
            cascade.semantic = Some(from_endpoint(endpoint));
        }
        cascade
    }

    pub fn with_nlp(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.nlp = Some(classifier);
        self
    }

    pub fn with_semantic(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.semantic = Some(classifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nlp.is_none() && self.semantic.is_none()
    }

    fn qualifies(&self, layer: CascadeLayer, classification: &Classification) -> bool {
        if !classification.matched {
            return false;
        }
        match layer {
            CascadeLayer::Nlp => classification.confidence >= self.nlp_threshold,
            CascadeLayer::Semantic => {
                classification.method.as_deref() == Some(SEMANTIC_METHOD)
                    && classification.confidence >= self.semantic_threshold
            }
        }
    }

    /// Try each configured layer in order; `None` when nothing qualified
    ///
    /// Answers naming an expert the pattern store does not know (other than
    /// `cicd`) are treated as no result.
    pub async fn run(&self, description: &str, patterns: &PatternStore) -> Option<CascadeHit> {
        let layers = [
            (CascadeLayer::Nlp, self.nlp.as_ref()),
            (CascadeLayer::Semantic, self.semantic.as_ref()),
        ];

        for (layer, classifier) in layers {
            let Some(classifier) = classifier else {
                continue;
            };

            let span = crate::cascade_span!(layer = layer.as_str());
            if let Some(hit) = self
                .attempt(layer, classifier.as_ref(), description, patterns)
                .instrument(span)
                .await
            {
                return Some(hit);
            }
        }

        None
    }

    async fn attempt(
        &self,
        layer: CascadeLayer,
        classifier: &dyn Classifier,
        description: &str,
        patterns: &PatternStore,
    ) -> Option<CascadeHit> {
        metrics().layer_attempted(layer.as_str());

        let classification = match classifier.classify(description).await {
            Ok(Some(classification)) => classification,
            Ok(None) => {
                debug!(layer = layer.as_str(), "Classifier had no opinion");
                return None;
            }
            Err(e) => {
                metrics().layer_failed(layer.as_str());
                let error = e.into_router_error(layer.as_str());
                warn!(layer = layer.as_str(), error = %error.sanitized_message(), "Cascade layer failed, skipping");
                return None;
            }
        };

        let known = classification.expert == Expert::Cicd
            || patterns.contains(&classification.expert);
        if !known {
            debug!(
                layer = layer.as_str(),
                expert = %classification.expert,
                "Classifier named an unknown expert, ignoring"
            );
            return None;
        }

        if !self.qualifies(layer, &classification) {
            debug!(
                layer = layer.as_str(),
                expert = %classification.expert,
                confidence = classification.confidence,
                method = classification.method.as_deref().unwrap_or("unreported"),
                "Classifier answer below threshold"
            );
            return None;
        }

        metrics().layer_qualified(layer.as_str());
        info!(
            layer = layer.as_str(),
            expert = %classification.expert,
            confidence = classification.confidence,
            "Cascade layer qualified"
        );
        Some(CascadeHit {
            layer,
            classification,
        })
    }
}
