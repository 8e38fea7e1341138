//! HTTP classifier service
//!
//! Sends `{"text": "<description>"}` via POST and expects a
//! [`ClassifierResponse`](crate::classifiers::ClassifierResponse) body.
//! Server errors and network failures are retried with exponential backoff;
//! a timeout ends the attempt immediately.
//!
//! ```no_run
//! use moe_router::classifiers::{Classifier, HttpClassifier};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = HttpClassifier::new("http://localhost:8082/classify".to_string(), 5000, 2);
//! let _answer = classifier.classify("investigate CVE exposure").await?;
//! # Ok(())
//! # }
//! ```

use crate::classifiers::schema::parse_response;
use crate::classifiers::{Classification, Classifier, ClassifierError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpClassifier {
    url: String,
    timeout: Duration,
    retry_attempts: usize,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

impl HttpClassifier {
    pub fn new(url: String, timeout_ms: u64, retry_attempts: usize) -> Self {
        Self {
            url,
            timeout: Duration::from_millis(timeout_ms),
            retry_attempts,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_service(&self, description: &str) -> Result<String, ClassifierError> {
        let request = ClassifyRequest { text: description };
        let mut last_error = None;

        for attempt in 0..=self.retry_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.retry_attempts + 1,
                url = %self.url,
                "Calling classifier service"
            );

            match self
                .client
                .post(&self.url)
                .json(&request)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.text().await.map_err(|e| {
                            ClassifierError::Unavailable(format!("failed to read response body: {e}"))
                        });
                    } else if status.is_server_error() && attempt < self.retry_attempts {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "Classifier returned server error, retrying"
                        );
                        backoff(attempt).await;
                        last_error = Some(format!("server error: {status}"));
                        continue;
                    } else {
                        return Err(ClassifierError::Unavailable(format!(
                            "classifier responded with status {status}"
                        )));
                    }
                }
                Err(e) if e.is_timeout() => {
                    return Err(ClassifierError::Timeout(self.timeout));
                }
                Err(e) if attempt < self.retry_attempts => {
                    warn!(error = %e, attempt = attempt + 1, "Classifier network error, retrying");
                    backoff(attempt).await;
                    last_error = Some(format!("network error: {e}"));
                    continue;
                }
                Err(e) => {
                    return Err(ClassifierError::Unavailable(format!(
                        "classifier request failed: {e}"
                    )));
                }
            }
        }

        Err(ClassifierError::Unavailable(format!(
            "classifier failed after {} retries: {}",
            self.retry_attempts,
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

async fn backoff(attempt: usize) {
    let backoff_ms = 100 * 2_u64.pow(attempt as u32);
    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, description: &str) -> Result<Option<Classification>, ClassifierError> {
        let body = self.call_service(description).await?;
        parse_response(&body)
    }
}
