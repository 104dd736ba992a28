//! Terminal persistence of the audit record
//!
//! [`FileAuditSink`] writes the full state as JSON plus a human-readable
//! summary next to it. [`PersistStage`] wraps any sink with bounded
//! retry and doubling backoff; exhausting the attempts is the one fatal
//! outcome in the workflow.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::PersistConfig;
use crate::model::WorkflowState;
use crate::render;
use crate::services::AuditSink;
use crate::{Error, Result};

/// Writes audit records under a data directory
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    dir: PathBuf,
}

impl FileAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn save(&self, run_id: &str, state: &WorkflowState) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let now = Utc::now();
        let timestamp = now.format("%Y%m%d_%H%M%S");
        let state_path = self.dir.join(format!("{}_{}.json", run_id, timestamp));
        let summary_path = self.dir.join(format!("{}_{}_summary.md", run_id, timestamp));

        let mut record = serde_json::to_value(state)?;
        if let Some(object) = record.as_object_mut() {
            object.insert(
                "saved_at".to_string(),
                serde_json::Value::String(now.to_rfc3339()),
            );
        }
        let json = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&state_path, json).await?;
        tokio::fs::write(&summary_path, render::run_summary(state)).await?;

        Ok(state_path)
    }
}

/// Persists the final state with retry
pub struct PersistStage {
    audit: Arc<dyn AuditSink>,
    max_attempts: u32,
    backoff: Duration,
}

impl PersistStage {
    pub fn new(audit: Arc<dyn AuditSink>, config: &PersistConfig) -> Self {
        Self {
            audit,
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff,
        }
    }

    /// Write the audit record, retrying transient failures
    ///
    /// The final failure escalates to the caller; a run whose record
    /// cannot be written must not be reported as complete.
    pub async fn run(&self, state: &WorkflowState) -> Result<PathBuf> {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.max_attempts {
            match self.audit.save(&state.run_id, state).await {
                Ok(path) => {
                    info!(path = %path.display(), attempt, "Run persisted");
                    return Ok(path);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Persistence attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        let wait = self.backoff * 2u32.pow(attempt - 1);
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Err(Error::Persistence(format!(
            "run {} not persisted after {} attempt(s): {}",
            state.run_id, self.max_attempts, detail
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySink {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl AuditSink for FlakySink {
        async fn save(&self, _run_id: &str, _state: &WorkflowState) -> Result<PathBuf> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(PathBuf::from(format!("/tmp/record_{}.json", call)))
            } else {
                Err(Error::Persistence("disk full".to_string()))
            }
        }
    }

    fn config() -> PersistConfig {
        PersistConfig {
            data_dir: PathBuf::from("unused"),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_file_sink_writes_state_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FileAuditSink::new(dir.path());
        let state = WorkflowState::new("octo", "widgets");

        let path = sink.save(&state.run_id, &state).await.unwrap();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with(&state.run_id));

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"saved_at\""));
        // The extra field does not break restoring the state itself
        let restored: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.run_id, state.run_id);

        let summary = path.with_file_name(format!(
            "{}_summary.md",
            path.file_stem().unwrap().to_str().unwrap()
        ));
        assert!(summary.exists());
        let text = std::fs::read_to_string(summary).unwrap();
        assert!(text.contains("# Review Run Summary"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let sink = Arc::new(FlakySink {
            calls: AtomicU32::new(0),
            succeed_on: 3,
        });
        let stage = PersistStage::new(sink.clone(), &config());
        let state = WorkflowState::new("o", "r");

        let path = stage.run(&state).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/record_3.json"));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_fatal() {
        let sink = Arc::new(FlakySink {
            calls: AtomicU32::new(0),
            succeed_on: 10,
        });
        let stage = PersistStage::new(sink.clone(), &config());
        let state = WorkflowState::new("o", "r");

        let err = stage.run(&state).await.unwrap_err();
        assert!(err.to_string().contains("after 3 attempt(s)"));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }
}
