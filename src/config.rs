//! Router configuration
//!
//! Process configuration is a TOML file. The routing data itself (patterns,
//! weights, model catalog) lives in separate JSON stores referenced from the
//! `[stores]` section and is loaded by `routing::snapshot`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Locations searched when no configuration file is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["moe-router.toml", "config/moe-router.toml"];

/// Main router configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RouterConfig {
    #[serde(default)]
    pub stores: StoresSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub access: AccessSection,
    #[serde(default)]
    pub classifiers: ClassifiersSection,
    #[serde(default)]
    pub journal: JournalSection,
    /// Dashboard event emission (optional)
    pub dashboard: Option<DashboardSection>,
}

/// Locations of the JSON stores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoresSection {
    /// Pattern store with thresholds and per-expert keyword lists (required at startup)
    #[serde(default = "default_patterns_path")]
    pub patterns: PathBuf,
    /// Learned weight store produced by the offline learning job
    pub learned_weights: Option<PathBuf>,
    /// Directory of timestamped utility weight snapshots
    pub utility_weights_dir: Option<PathBuf>,
    /// Model tier catalog
    pub model_catalog: Option<PathBuf>,
}

impl Default for StoresSection {
    fn default() -> Self {
        Self {
            patterns: default_patterns_path(),
            learned_weights: None,
            utility_weights_dir: None,
            model_catalog: None,
        }
    }
}

fn default_patterns_path() -> PathBuf {
    PathBuf::from("config/expert_patterns.json")
}

/// Routing pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingSection {
    /// Tasks scoring above this on the 1-10 complexity scale go to the initializer
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: u8,
    #[serde(default = "default_true")]
    pub complexity_gate_enabled: bool,
    /// Minimum confidence for the NLP hybrid classifier to decide
    #[serde(default = "default_nlp_threshold")]
    pub nlp_confidence_threshold: f64,
    /// Minimum confidence for the semantic classifier to decide
    #[serde(default = "default_semantic_threshold")]
    pub semantic_confidence_threshold: f64,
    #[serde(default = "default_true")]
    pub learned_weights_enabled: bool,
    #[serde(default = "default_true")]
    pub utility_weights_enabled: bool,
    /// Where a `cicd` verdict from the NLP classifier is scored
    #[serde(default)]
    pub cicd_placement: CicdPlacement,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            complexity_threshold: default_complexity_threshold(),
            complexity_gate_enabled: true,
            nlp_confidence_threshold: default_nlp_threshold(),
            semantic_confidence_threshold: default_semantic_threshold(),
            learned_weights_enabled: true,
            utility_weights_enabled: true,
            cicd_placement: CicdPlacement::default(),
        }
    }
}

/// Slot used for a `cicd` verdict of the NLP classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CicdPlacement {
    /// Score it in the `development` slot (historical behavior)
    #[default]
    Fold,
    /// Score it in its own `cicd` slot
    Dedicated,
}

/// Access control for the pattern store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessSection {
    /// Caller identities allowed to route; `*` admits everyone
    #[serde(default = "default_allowed_callers")]
    pub allowed_callers: Vec<String>,
}

impl Default for AccessSection {
    fn default() -> Self {
        Self {
            allowed_callers: default_allowed_callers(),
        }
    }
}

fn default_allowed_callers() -> Vec<String> {
    vec!["*".to_string()]
}

/// External cascade layers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClassifiersSection {
    pub nlp: Option<ClassifierEndpoint>,
    pub semantic: Option<ClassifierEndpoint>,
}

/// How an external classifier is reached
///
/// Simple form: `{ url = "http://..." }`; process form: `{ command = ["python3", "classify.py"] }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClassifierEndpoint {
    Http {
        url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        retry_attempts: usize,
    },
    Command {
        command: Vec<String>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl ClassifierEndpoint {
    pub fn timeout(&self) -> Duration {
        match self {
            ClassifierEndpoint::Http { timeout_ms, .. }
            | ClassifierEndpoint::Command { timeout_ms, .. } => Duration::from_millis(*timeout_ms),
        }
    }

    fn validate(&self, layer: &str) -> Result<(), ConfigError> {
        match self {
            ClassifierEndpoint::Http { url, .. } => {
                url::Url::parse(url)
                    .map_err(|e| ConfigError::InvalidUrl(format!("{layer}: {url} ({e})")))?;
            }
            ClassifierEndpoint::Command { command, .. } => {
                if command.is_empty() || command[0].trim().is_empty() {
                    return Err(ConfigError::InvalidConfig(format!(
                        "[classifiers.{layer}] command must not be empty"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Append-only logs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalSection {
    /// One compact JSON decision per line; omit to disable
    pub decision_log: Option<PathBuf>,
    /// Directory of `feedback-YYYY-MM-DD.jsonl` files; omit to disable
    pub feedback_dir: Option<PathBuf>,
}

impl Default for JournalSection {
    fn default() -> Self {
        Self {
            decision_log: Some(PathBuf::from("logs/routing-decisions.jsonl")),
            feedback_dir: Some(PathBuf::from("logs/feedback")),
        }
    }
}

/// MQTT dashboard event stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// MQTT broker URL (`mqtt://` or `mqtts://`)
    pub broker_url: String,
    #[serde(default = "default_dashboard_topic")]
    pub topic: String,
    /// Value of the `source` field on published events
    #[serde(default = "default_event_source")]
    pub source: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
}

fn default_complexity_threshold() -> u8 {
    3
}

fn default_nlp_threshold() -> f64 {
    0.7
}

fn default_semantic_threshold() -> f64 {
    0.6
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_dashboard_topic() -> String {
    "/moe/routing/events".to_string()
}

fn default_event_source() -> String {
    "moe-router".to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to parse JSON store {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Store not found: {0}")]
    StoreNotFound(PathBuf),
    #[error("Invalid caller ID format: {0}")]
    InvalidCallerId(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RouterConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the first default location that exists
    ///
    /// With no file anywhere the built-in defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|candidate| candidate.exists())
        {
            Some(found) => Self::load_from_file(found),
            None => Ok(Self::default()),
        }
    }

    /// Validate ranges, endpoints and caller identities
    pub fn validate(&self) -> Result<(), ConfigError> {
        let routing = &self.routing;
        if !(1..=10).contains(&routing.complexity_threshold) {
            return Err(ConfigError::InvalidConfig(format!(
                "complexity_threshold {} must be within 1..=10",
                routing.complexity_threshold
            )));
        }
        validate_unit_interval("nlp_confidence_threshold", routing.nlp_confidence_threshold)?;
        validate_unit_interval(
            "semantic_confidence_threshold",
            routing.semantic_confidence_threshold,
        )?;

        for caller in &self.access.allowed_callers {
            validate_caller_id(caller)?;
        }

        if let Some(ref nlp) = self.classifiers.nlp {
            nlp.validate("nlp")?;
        }
        if let Some(ref semantic) = self.classifiers.semantic {
            semantic.validate("semantic")?;
        }

        if let Some(ref dashboard) = self.dashboard {
            let url = url::Url::parse(&dashboard.broker_url)
                .map_err(|e| ConfigError::InvalidUrl(format!("{} ({e})", dashboard.broker_url)))?;
            if url.scheme() != "mqtt" && url.scheme() != "mqtts" {
                return Err(ConfigError::InvalidUrl(format!(
                    "dashboard broker_url must use mqtt:// or mqtts://, got {}",
                    dashboard.broker_url
                )));
            }
        }

        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[stores]
patterns = "config/expert_patterns.json"

[routing]
complexity_threshold = 3

[access]
allowed_callers = ["*"]
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

fn validate_unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidConfig(format!(
            "{name} {value} must be within 0.0..=1.0"
        )));
    }
    Ok(())
}

/// Caller identities are `*` or match `[a-zA-Z0-9._@-]+`
pub fn validate_caller_id(caller: &str) -> Result<(), ConfigError> {
    if caller == "*" {
        return Ok(());
    }

    let valid_chars = caller
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'));

    if caller.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidCallerId(format!(
            "Caller ID '{caller}' must match pattern [a-zA-Z0-9._@-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[stores]
patterns = "/etc/moe/patterns.json"
learned_weights = "/var/lib/moe/learned.json"
utility_weights_dir = "/var/lib/moe/utility"
model_catalog = "/etc/moe/model_tiers.json"

[routing]
complexity_threshold = 5
complexity_gate_enabled = false
nlp_confidence_threshold = 0.8
semantic_confidence_threshold = 0.65
learned_weights_enabled = false
utility_weights_enabled = true
cicd_placement = "dedicated"

[access]
allowed_callers = ["coordinator", "ops@cluster"]

[classifiers]
nlp = { command = ["python3", "scripts/nlp_classify.py"], timeout_ms = 10000 }
semantic = { url = "http://localhost:8082/classify", retry_attempts = 2 }

[journal]
decision_log = "/var/log/moe/decisions.jsonl"
feedback_dir = "/var/log/moe/feedback"

[dashboard]
broker_url = "mqtt://localhost:1883"
"#;

        let config: RouterConfig = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.stores.patterns, PathBuf::from("/etc/moe/patterns.json"));
        assert_eq!(config.routing.complexity_threshold, 5);
        assert!(!config.routing.complexity_gate_enabled);
        assert_eq!(config.routing.cicd_placement, CicdPlacement::Dedicated);
        assert_eq!(config.access.allowed_callers.len(), 2);

        match config.classifiers.nlp.unwrap() {
            ClassifierEndpoint::Command {
                command,
                timeout_ms,
            } => {
                assert_eq!(command, vec!["python3", "scripts/nlp_classify.py"]);
                assert_eq!(timeout_ms, 10000);
            }
            other => panic!("Expected command endpoint, got {other:?}"),
        }

        match config.classifiers.semantic.unwrap() {
            ClassifierEndpoint::Http {
                url,
                timeout_ms,
                retry_attempts,
            } => {
                assert_eq!(url, "http://localhost:8082/classify");
                assert_eq!(timeout_ms, 30_000);
                assert_eq!(retry_attempts, 2);
            }
            other => panic!("Expected http endpoint, got {other:?}"),
        }

        let dashboard = config.dashboard.unwrap();
        assert!(dashboard.enabled);
        assert_eq!(dashboard.topic, "/moe/routing/events");
        assert_eq!(dashboard.source, "moe-router");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: RouterConfig = toml::from_str("").unwrap();

        assert_eq!(config, RouterConfig::default());
        assert_eq!(config.routing.complexity_threshold, 3);
        assert_eq!(config.routing.nlp_confidence_threshold, 0.7);
        assert_eq!(config.routing.semantic_confidence_threshold, 0.6);
        assert_eq!(config.routing.cicd_placement, CicdPlacement::Fold);
        assert_eq!(config.access.allowed_callers, vec!["*"]);
        assert!(config.classifiers.nlp.is_none());
        assert!(config.dashboard.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_test_config_is_valid() {
        let config = RouterConfig::test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = RouterConfig::default();
        config.routing.nlp_confidence_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        let mut config = RouterConfig::default();
        config.routing.complexity_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_classifier_url_rejected() {
        let mut config = RouterConfig::default();
        config.classifiers.nlp = Some(ClassifierEndpoint::Http {
            url: "not a url".to_string(),
            timeout_ms: 1000,
            retry_attempts: 0,
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_empty_command_rejected() {
        let mut config = RouterConfig::default();
        config.classifiers.semantic = Some(ClassifierEndpoint::Command {
            command: vec![],
            timeout_ms: 1000,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dashboard_requires_mqtt_scheme() {
        let mut config = RouterConfig::default();
        config.dashboard = Some(DashboardSection {
            enabled: true,
            broker_url: "http://localhost:1883".to_string(),
            topic: default_dashboard_topic(),
            source: default_event_source(),
            username_env: None,
            password_env: None,
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_caller_id_validation() {
        assert!(validate_caller_id("*").is_ok());
        assert!(validate_caller_id("ops@cluster-1.local").is_ok());
        assert!(validate_caller_id("bad caller").is_err());
        assert!(validate_caller_id("").is_err());
    }

    #[test]
    fn test_endpoint_timeout() {
        let endpoint = ClassifierEndpoint::Command {
            command: vec!["classify".to_string()],
            timeout_ms: 250,
        };
        assert_eq!(endpoint.timeout(), Duration::from_millis(250));
    }
}
