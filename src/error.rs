//! Error types for the expert router
//!
//! Only `PermissionDenied`, `ConfigMissing` and `InvalidInput` are ever
//! surfaced to a caller of `Router::route`. Cascade layer failures are soft
//! failures inside the cascade; journal failures are swallowed by the
//! decision assembler.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("static regex is valid")
});

const MAX_MESSAGE_LEN: usize = 500;

/// Main error type for routing operations
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Permission denied: caller '{caller}' may not read the pattern store ({reason})")]
    PermissionDenied { caller: String, reason: String },

    #[error("Configuration missing: {message}")]
    ConfigMissing { message: String },

    #[error("External layer '{layer}' unavailable: {message}")]
    ExternalLayerUnavailable { layer: String, message: String },

    #[error("Malformed response from layer '{layer}': {message}")]
    MalformedExternalResponse { layer: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Journal write failed: {0}")]
    Journal(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RouterError {
    /// Create permission denied error
    pub fn permission_denied<C: Into<String>, R: Into<String>>(caller: C, reason: R) -> Self {
        Self::PermissionDenied {
            caller: caller.into(),
            reason: reason.into(),
        }
    }

    /// Create config missing error
    pub fn config_missing<S: Into<String>>(message: S) -> Self {
        Self::ConfigMissing {
            message: message.into(),
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error must be returned to the caller instead of producing a fallback decision
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RouterError::PermissionDenied { .. } | RouterError::ConfigMissing { .. }
        )
    }

    /// Error text safe to print or publish on a dashboard
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Redact secrets and sensitive paths, truncate to 500 characters
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
