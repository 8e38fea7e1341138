//! Local process classifier
//!
//! Runs the configured command with the task description appended as the last
//! argument and parses stdout as a classifier response. A missing program, a
//! non-zero exit or a timeout makes the layer unavailable.

use crate::classifiers::schema::parse_response;
use crate::classifiers::{Classification, Classifier, ClassifierError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const MAX_STDERR_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandClassifier {
    /// `command[0]` is the program, the rest are fixed leading arguments
    pub fn new(command: Vec<String>, timeout_ms: u64) -> Self {
        let mut parts = command.into_iter();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn run(&self, description: &str) -> Result<String, ClassifierError> {
        if self.program.trim().is_empty() {
            return Err(ClassifierError::Unavailable(
                "no classifier command configured".to_string(),
            ));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(description)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            ClassifierError::Unavailable(format!("failed to spawn '{}': {e}", self.program))
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ClassifierError::Unavailable(format!(
                    "failed to collect output of '{}': {e}",
                    self.program
                )));
            }
            // Dropping the child future kills the process
            Err(_) => return Err(ClassifierError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(ClassifierError::Unavailable(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        debug!(program = %self.program, bytes = output.stdout.len(), "Classifier command finished");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    async fn classify(&self, description: &str) -> Result<Option<Classification>, ClassifierError> {
        let stdout = self.run(description).await?;
        parse_response(&stdout)
    }
}
