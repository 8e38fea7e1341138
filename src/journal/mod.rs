//! Append-only JSON Lines journals
//!
//! Decisions go to a single log file, feedback to one file per UTC day.
//! Each record is serialized to a complete line first and written with a
//! single `write_all` while the file lock is held, so concurrent appends
//! never interleave partial records.

pub mod decision_log;
pub mod feedback;

pub use decision_log::DecisionLog;
pub use feedback::FeedbackLog;

use crate::error::{RouterError, RouterResult};
use serde::Serialize;
use std::path::Path;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Serialize `record` as one compact line including the trailing newline
pub fn to_line<T: Serialize>(record: &T) -> RouterResult<Vec<u8>> {
    let mut line = serde_json::to_vec(record)
        .map_err(|e| RouterError::internal_error(format!("failed to serialize record: {e}")))?;
    line.push(b'\n');
    Ok(line)
}

/// Open `path` for appending, creating parent directories as needed
pub async fn open_append(path: &Path) -> RouterResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(file)
}

pub async fn write_line(file: &mut File, line: &[u8]) -> RouterResult<()> {
    file.write_all(line).await?;
    file.flush().await?;
    Ok(())
}
