//! Date-partitioned feedback log
//!
//! Records land in `<dir>/feedback-YYYY-MM-DD.jsonl`, keyed by the UTC date
//! of the record's timestamp. The offline learning job consumes these files;
//! the router never reads them back.

use crate::error::{RouterError, RouterResult};
use crate::journal::{open_append, to_line, write_line};
use crate::protocol::FeedbackRecord;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, Instrument};

#[derive(Debug)]
pub struct FeedbackLog {
    dir: PathBuf,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl FeedbackLog {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            current: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("feedback-{}.jsonl", date.format("%Y-%m-%d")))
    }

    pub async fn append(&self, record: &FeedbackRecord) -> RouterResult<()> {
        let line = to_line(record)?;
        let date = record.timestamp.date_naive();
        let span = crate::journal_span!(journal = "feedback", task_id = %record.task_id);

        async {
            let mut guard = self.current.lock().await;
            let stale = !matches!(guard.as_ref(), Some((open_date, _)) if *open_date == date);
            if stale {
                let file = open_append(&self.file_for(date)).await?;
                *guard = Some((date, file));
            }

            let result = match guard.as_mut() {
                Some((_, file)) => write_line(file, &line).await,
                None => Ok(()),
            };
            if result.is_err() {
                *guard = None;
            }
            result?;

            debug!(date = %date, expert = %record.expert, "Feedback appended");
            Ok::<(), RouterError>(())
        }
        .instrument(span)
        .await
    }
}
