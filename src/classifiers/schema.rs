//! Response schema shared by every external classifier
//!
//! A raw response is first checked against the JSON schema generated from
//! [`ClassifierResponse`], then deserialized and checked for internal
//! consistency.

use crate::classifiers::{Classification, ClassifierError};
use crate::routing::expert::Expert;
use jsonschema::Validator;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(ClassifierResponse::json_schema);

static RESPONSE_VALIDATOR: Lazy<Result<Validator, String>> = Lazy::new(|| {
    jsonschema::validator_for(&RESPONSE_SCHEMA).map_err(|e| e.to_string())
});

/// Wire response of an external classifier
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClassifierResponse {
    /// Expert name chosen by the classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert: Option<String>,

    /// Older classifiers report the expert as `category`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Confidence in the 0.0-1.0 range
    pub confidence: f64,

    /// Classification method, e.g. `semantic`, `keyword`, `hybrid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Whether the classifier considers the text a match at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_keywords: Option<Vec<String>>,
}

impl ClassifierResponse {
    /// Generate the JSON schema for this structure
    pub fn json_schema() -> Value {
        let schema = schemars::schema_for!(ClassifierResponse);
        serde_json::to_value(schema).unwrap_or(Value::Bool(true))
    }

    /// Semantic checks the schema cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.expert_name().is_none() {
            return Err("response names no expert (expected 'expert' or 'category')".to_string());
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence {} must be within 0.0..=1.0",
                self.confidence
            ));
        }
        Ok(())
    }

    fn expert_name(&self) -> Option<&str> {
        self.expert
            .as_deref()
            .or(self.category.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn into_classification(self) -> Result<Classification, String> {
        self.validate()?;
        let expert = Expert::from(self.expert_name().unwrap_or_default());

        Ok(Classification {
            expert,
            confidence: self.confidence,
            method: self
                .method
                .map(|method| method.trim().to_lowercase())
                .filter(|method| !method.is_empty()),
            matched: self.matched.unwrap_or(true),
            matched_keywords: self.matched_keywords.unwrap_or_default(),
        })
    }
}

/// Validate and convert a raw response body
///
/// An empty body or JSON `null` means the classifier had no opinion.
pub fn parse_response(body: &str) -> Result<Option<Classification>, ClassifierError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ClassifierError::Malformed(format!("invalid JSON: {e}")))?;
    if value.is_null() {
        return Ok(None);
    }

    let validator = RESPONSE_VALIDATOR
        .as_ref()
        .map_err(|e| ClassifierError::Malformed(format!("schema compilation error: {e}")))?;
    validator.validate(&value).map_err(|errors| {
        let messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        ClassifierError::Malformed(messages.join("; "))
    })?;

    let response: ClassifierResponse =
        serde_json::from_value(value).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    response
        .into_classification()
        .map(Some)
        .map_err(ClassifierError::Malformed)
}
