//! External classifier layers of the cascade
//!
//! A layer is anything implementing [`Classifier`]. The transport (HTTP
//! service or local command) is a construction detail; the cascade only sees
//! the trait. Layer failures are soft: they surface as [`ClassifierError`]
//! and the cascade moves on to the next layer.

pub mod cascade;
pub mod command;
pub mod http;
pub mod schema;

pub use cascade::{CascadeHit, CascadeLayer, ClassifierCascade};
pub use command::CommandClassifier;
pub use http::HttpClassifier;
pub use schema::ClassifierResponse;

use crate::config::ClassifierEndpoint;
use crate::error::RouterError;
use crate::routing::expert::Expert;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One classifier answer
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub expert: Expert,
    /// 0.0-1.0
    pub confidence: f64,
    /// Method reported by the classifier, e.g. `semantic` or `keyword`;
    /// `None` when the response did not say
    pub method: Option<String>,
    pub matched: bool,
    pub matched_keywords: Vec<String>,
}

/// Soft failure of a single cascade layer
#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl ClassifierError {
    pub fn into_router_error(self, layer: &str) -> RouterError {
        match self {
            ClassifierError::Malformed(message) => RouterError::MalformedExternalResponse {
                layer: layer.to_string(),
                message,
            },
            other => RouterError::ExternalLayerUnavailable {
                layer: layer.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// `Ok(None)` means the classifier answered but had no opinion
    async fn classify(&self, description: &str) -> Result<Option<Classification>, ClassifierError>;
}

/// Build a classifier for a configured endpoint
pub fn from_endpoint(endpoint: &ClassifierEndpoint) -> Arc<dyn Classifier> {
    match endpoint {
        ClassifierEndpoint::Http {
            url,
            timeout_ms,
            retry_attempts,
        } => Arc::new(HttpClassifier::new(url.clone(), *timeout_ms, *retry_attempts)),
        ClassifierEndpoint::Command {
            command,
            timeout_ms,
        } => Arc::new(CommandClassifier::new(command.clone(), *timeout_ms)),
    }
}
