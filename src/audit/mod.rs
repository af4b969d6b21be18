//! Append-only audit trail.
//!
//! # Design Decisions
//! - One record per call, written synchronously; no buffering or batching
//! - Callers audit immediately after the operation, before the response
//! - A failing sink is logged but never blocks the response

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Outcome attached to each audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// One attempted operation, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub client_id: String,
    pub outcome: AuditOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<HashMap<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Abstract audit sink so the pipeline can be tested without a filesystem.
pub trait AuditSink: Send + Sync {
    fn log_success(&self, operation: &str, client_id: &str, parameters: &HashMap<String, Value>);
    fn log_failure(&self, operation: &str, client_id: &str, reason: &str);
}

/// File-backed sink appending one JSON line per record.
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Open (or create) the audit log for appending.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &AuditRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode audit record");
                return;
            }
        };
        let mut file = self.file.lock().expect("audit file mutex poisoned");
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to append audit record");
        }
    }
}

impl AuditSink for FileAuditSink {
    fn log_success(&self, operation: &str, client_id: &str, parameters: &HashMap<String, Value>) {
        self.append(&AuditRecord {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            client_id: client_id.to_string(),
            outcome: AuditOutcome::Success,
            parameters: Some(parameters.clone()),
            reason: None,
        });
    }

    fn log_failure(&self, operation: &str, client_id: &str, reason: &str) {
        self.append(&AuditRecord {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            client_id: client_id.to_string(),
            outcome: AuditOutcome::Failure,
            parameters: None,
            reason: Some(reason.to_string()),
        });
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .expect("audit records mutex poisoned")
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_success(&self, operation: &str, client_id: &str, parameters: &HashMap<String, Value>) {
        self.records
            .lock()
            .expect("audit records mutex poisoned")
            .push(AuditRecord {
                timestamp: Utc::now(),
                operation: operation.to_string(),
                client_id: client_id.to_string(),
                outcome: AuditOutcome::Success,
                parameters: Some(parameters.clone()),
                reason: None,
            });
    }

    fn log_failure(&self, operation: &str, client_id: &str, reason: &str) {
        self.records
            .lock()
            .expect("audit records mutex poisoned")
            .push(AuditRecord {
                timestamp: Utc::now(),
                operation: operation.to_string(),
                client_id: client_id.to_string(),
                outcome: AuditOutcome::Failure,
                parameters: None,
                reason: Some(reason.to_string()),
            });
    }
}
