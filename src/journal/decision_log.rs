//! Decision audit log

use crate::error::{RouterError, RouterResult};
use crate::journal::{open_append, to_line, write_line};
use crate::protocol::DecisionRecord;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, Instrument};

/// Appends one [`DecisionRecord`] per line
///
/// The file is opened on first use and reopened after a failed write, so a
/// log directory that appears later starts receiving records.
#[derive(Debug)]
pub struct DecisionLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl DecisionLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &DecisionRecord) -> RouterResult<()> {
        let line = to_line(record)?;
        let span = crate::journal_span!(journal = "decisions", task_id = %record.task_id);

        async {
            let mut guard = self.file.lock().await;
            if guard.is_none() {
                *guard = Some(open_append(&self.path).await?);
            }

            let result = match guard.as_mut() {
                Some(file) => write_line(file, &line).await,
                None => Ok(()),
            };
            if result.is_err() {
                *guard = None;
            }
            result?;

            debug!(path = %self.path.display(), "Decision appended");
            Ok::<(), RouterError>(())
        }
        .instrument(span)
        .await
    }
}
