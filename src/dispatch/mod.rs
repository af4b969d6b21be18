//! Request dispatcher.
//!
//! # Data Flow
//! Decoded `Request` -> validator -> operation handler -> `Response`.
//!
//! # Responsibilities
//! Route each validated request to its operation handler, assemble the
//! response payload, and write the success/failure audit record for the
//! operation itself. Rejections are audited inside the validator, so the
//! dispatcher only converts them to wire responses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::audit::AuditSink;
use crate::backup::{BackupError, BackupManager};
use crate::hosts::{HostsError, HostsFile};
use crate::ipc::protocol::{
    HostEntry, Request, Response, OP_BACKUP_HOSTS, OP_GET_STATUS, OP_RESTORE_HOSTS,
    OP_VALIDATE_HOSTS, OP_WRITE_HOSTS,
};
use crate::security::RequestValidator;

/// An operation-level failure: a symbolic code plus a human message.
struct OpError {
    code: &'static str,
    message: String,
}

impl OpError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<BackupError> for OpError {
    fn from(err: BackupError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<HostsError> for OpError {
    fn from(err: HostsError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

type OpResult = Result<HashMap<String, Value>, OpError>;

/// Routes validated requests to the hosts file and backup registry.
pub struct Dispatcher {
    validator: RequestValidator,
    backups: BackupManager,
    hosts: HostsFile,
    audit: Arc<dyn AuditSink>,
    service_name: String,
    started_at: Instant,
}

impl Dispatcher {
    pub fn new(
        validator: RequestValidator,
        backups: BackupManager,
        hosts: HostsFile,
        audit: Arc<dyn AuditSink>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            backups,
            hosts,
            audit,
            service_name: service_name.into(),
            started_at: Instant::now(),
        }
    }

    /// Handle one request end to end. Never panics and never returns an
    /// error: every outcome is a `Response`.
    pub fn handle(&self, request: &Request) -> Response {
        if let Err(err) = self.validator.validate(request) {
            return Response::rejected(err.code(), &err.to_string());
        }

        let result = match request.operation.as_str() {
            OP_WRITE_HOSTS => self.handle_write_hosts(request),
            OP_BACKUP_HOSTS => self.handle_backup_hosts(request),
            OP_RESTORE_HOSTS => self.handle_restore_hosts(request),
            OP_VALIDATE_HOSTS => self.handle_validate_hosts(),
            OP_GET_STATUS => self.handle_get_status(),
            // Unreachable past the allow-list check; kept as a hard stop.
            other => Err(OpError::new(
                "OPERATION_NOT_ALLOWED",
                format!("operation not allowed: {}", other),
            )),
        };

        match result {
            Ok(data) => {
                self.audit
                    .log_success(&request.operation, &request.client_id, &request.parameters);
                Response::ok(data)
            }
            Err(err) => {
                tracing::warn!(
                    client = %request.client_id,
                    operation = %request.operation,
                    code = err.code,
                    error = %err.message,
                    "operation failed"
                );
                self.audit
                    .log_failure(&request.operation, &request.client_id, &err.message);
                Response::rejected(err.code, &err.message)
            }
        }
    }

    fn handle_write_hosts(&self, request: &Request) -> OpResult {
        let entries_value = request
            .parameters
            .get("entries")
            .cloned()
            .unwrap_or(Value::Null);
        let entries: Vec<HostEntry> = serde_json::from_value(entries_value)
            .map_err(|e| OpError::new("VALIDATION_FAILED", format!("invalid entries: {}", e)))?;

        // Safety net before mutating the file. A missing hosts file means a
        // first-time write, not a failure.
        let backup_id = if self.hosts.path().is_file() {
            let info = self.backups.create_backup(
                self.hosts.path(),
                None,
                "pre-write safety backup",
                vec!["hosts".to_string(), "auto".to_string()],
                true,
            )?;
            Some(info.id)
        } else {
            None
        };

        let written = self.hosts.apply(&entries)?;

        let mut data = HashMap::new();
        data.insert("entries_written".to_string(), Value::from(written));
        if let Some(id) = backup_id {
            data.insert("backup_id".to_string(), Value::from(id));
        }
        Ok(data)
    }

    fn handle_backup_hosts(&self, request: &Request) -> OpResult {
        let name = request.parameters.get("name").and_then(Value::as_str);
        let description = request
            .parameters
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("manual backup");

        let info = self.backups.create_backup(
            self.hosts.path(),
            name,
            description,
            vec!["hosts".to_string()],
            false,
        )?;

        let mut data = HashMap::new();
        data.insert("backup_id".to_string(), Value::from(info.id));
        data.insert(
            "backup_path".to_string(),
            Value::from(info.path.display().to_string()),
        );
        data.insert(
            "created_at".to_string(),
            Value::from(info.created_at.to_rfc3339()),
        );
        data.insert("size".to_string(), Value::from(info.size));
        Ok(data)
    }

    fn handle_restore_hosts(&self, request: &Request) -> OpResult {
        let target: Option<PathBuf> = request
            .parameters
            .get("target_path")
            .and_then(Value::as_str)
            .map(PathBuf::from);

        let backup_id = match request.parameters.get("backup_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                // Legacy callers pass the backup file path; the id is its stem.
                let path = request
                    .parameters
                    .get("backup_path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        OpError::new("VALIDATION_FAILED", "backup_id parameter is required")
                    })?;
                backup_id_from_path(path).ok_or_else(|| {
                    OpError::new(
                        "VALIDATION_FAILED",
                        format!("cannot derive backup id from path: {}", path),
                    )
                })?
            }
        };

        let restored_to = self.backups.restore_backup(&backup_id, target.as_deref())?;

        let mut data = HashMap::new();
        data.insert("backup_id".to_string(), Value::from(backup_id));
        data.insert(
            "restored_to".to_string(),
            Value::from(restored_to.display().to_string()),
        );
        Ok(data)
    }

    fn handle_validate_hosts(&self) -> OpResult {
        let active_entries = self.hosts.validate()?;

        let mut data = HashMap::new();
        data.insert("valid".to_string(), Value::from(true));
        data.insert("active_entries".to_string(), Value::from(active_entries));
        data.insert(
            "hosts_path".to_string(),
            Value::from(self.hosts.path().display().to_string()),
        );
        Ok(data)
    }

    fn handle_get_status(&self) -> OpResult {
        let backup_stats = serde_json::to_value(self.backups.backup_stats())
            .map_err(|e| OpError::new("INTERNAL", e.to_string()))?;
        let security_stats = serde_json::to_value(self.validator.security_stats())
            .map_err(|e| OpError::new("INTERNAL", e.to_string()))?;

        let mut data = HashMap::new();
        data.insert("running".to_string(), Value::from(true));
        data.insert(
            "service".to_string(),
            Value::from(self.service_name.clone()),
        );
        data.insert(
            "uptime_secs".to_string(),
            Value::from(self.started_at.elapsed().as_secs()),
        );
        data.insert(
            "hosts_path".to_string(),
            Value::from(self.hosts.path().display().to_string()),
        );
        data.insert("backups".to_string(), backup_stats);
        data.insert("security".to_string(), security_stats);
        Ok(data)
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }
}

fn backup_id_from_path(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::config::{BackupConfig, HelperConfig};
    use tempfile::TempDir;

    fn test_dispatcher(dir: &TempDir) -> (Dispatcher, Arc<MemoryAuditSink>, PathBuf) {
        let hosts_path = dir.path().join("hosts");
        std::fs::write(&hosts_path, "127.0.0.1 localhost\n").unwrap();

        let config = HelperConfig {
            backup: BackupConfig {
                backup_dir: dir.path().join("backups").to_string_lossy().into_owned(),
                max_backups: 5,
            },
            ..HelperConfig::default()
        };

        let audit = Arc::new(MemoryAuditSink::new());
        let sink: Arc<dyn AuditSink> = audit.clone();
        let validator = RequestValidator::new(config.security.clone(), sink.clone());
        let backups = BackupManager::new(&config.backup.backup_dir, config.backup.max_backups)
            .unwrap();
        let hosts = HostsFile::new(&hosts_path);
        let dispatcher = Dispatcher::new(validator, backups, hosts, sink, "hosts-helper");
        (dispatcher, audit, hosts_path)
    }

    fn request(operation: &str, params: serde_json::Value) -> Request {
        let parameters = serde_json::from_value(params).unwrap();
        Request::new(operation, "test-client", parameters)
    }

    #[test]
    fn write_hosts_takes_a_safety_backup_first() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, audit, hosts_path) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(
            OP_WRITE_HOSTS,
            serde_json::json!({
                "entries": [
                    {"ip": "10.0.0.1", "hostname": "one.example.com", "enabled": true}
                ]
            }),
        ));
        assert!(response.success, "{:?}", response.error);

        let data = response.data.unwrap();
        assert_eq!(data["entries_written"], Value::from(1));
        let backup_id = data["backup_id"].as_str().unwrap();

        // The backup captured the pre-write content.
        let info = dispatcher.backups().get_backup(backup_id).unwrap();
        let original = std::fs::read_to_string(&info.path).unwrap();
        assert!(original.contains("localhost"));

        let current = std::fs::read_to_string(&hosts_path).unwrap();
        assert!(current.contains("one.example.com"));

        let records = audit.records();
        assert!(records
            .iter()
            .any(|r| r.operation == OP_WRITE_HOSTS && r.reason.is_none()));
    }

    #[test]
    fn invalid_entries_never_touch_the_file() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, hosts_path) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(
            OP_WRITE_HOSTS,
            serde_json::json!({
                "entries": [
                    {"ip": "10.0.0.1", "hostname": "ok.example.com", "enabled": true},
                    {"ip": "256.1.1.1", "hostname": "bad.example.com", "enabled": true}
                ]
            }),
        ));
        assert!(!response.success);
        assert_eq!(response.error_code(), Some("VALIDATION_FAILED"));

        // Rejected before any write, so the original content survives intact.
        let content = std::fs::read_to_string(&hosts_path).unwrap();
        assert_eq!(content, "127.0.0.1 localhost\n");
        assert!(dispatcher.backups().list_backups().is_empty());
    }

    #[test]
    fn backup_then_restore_round_trips() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, hosts_path) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(
            OP_BACKUP_HOSTS,
            serde_json::json!({"name": "before-test"}),
        ));
        assert!(response.success, "{:?}", response.error);
        let data = response.data.unwrap();
        let backup_id = data["backup_id"].as_str().unwrap().to_string();
        assert!(backup_id.starts_with("before-test-"));

        std::fs::write(&hosts_path, "10.9.9.9 clobbered\n").unwrap();

        let response = dispatcher.handle(&request(
            OP_RESTORE_HOSTS,
            serde_json::json!({"backup_id": backup_id}),
        ));
        assert!(response.success, "{:?}", response.error);

        let content = std::fs::read_to_string(&hosts_path).unwrap();
        assert_eq!(content, "127.0.0.1 localhost\n");
    }

    #[test]
    fn restore_accepts_legacy_backup_path() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, hosts_path) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(OP_BACKUP_HOSTS, serde_json::json!({})));
        let data = response.data.unwrap();
        let backup_path = data["backup_path"].as_str().unwrap().to_string();

        std::fs::write(&hosts_path, "10.9.9.9 clobbered\n").unwrap();

        let response = dispatcher.handle(&request(
            OP_RESTORE_HOSTS,
            serde_json::json!({"backup_path": backup_path}),
        ));
        assert!(response.success, "{:?}", response.error);
        assert_eq!(
            std::fs::read_to_string(&hosts_path).unwrap(),
            "127.0.0.1 localhost\n"
        );
    }

    #[test]
    fn restore_unknown_backup_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, audit, _) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(
            OP_RESTORE_HOSTS,
            serde_json::json!({"backup_id": "no-such-backup"}),
        ));
        assert!(!response.success);
        assert_eq!(response.error_code(), Some("BACKUP_NOT_FOUND"));

        let records = audit.records();
        assert!(records
            .iter()
            .any(|r| r.operation == OP_RESTORE_HOSTS && r.reason.is_some()));
    }

    #[test]
    fn get_status_reports_service_and_counters() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(OP_GET_STATUS, serde_json::json!({})));
        assert!(response.success);

        let data = response.data.unwrap();
        assert_eq!(data["running"], Value::from(true));
        assert_eq!(data["service"], Value::from("hosts-helper"));
        assert!(data["backups"].get("total_backups").is_some());
        assert!(data["security"].get("blacklisted_clients").is_some());
    }

    #[test]
    fn validate_hosts_counts_active_entries() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _, _) = test_dispatcher(&dir);

        let response = dispatcher.handle(&request(OP_VALIDATE_HOSTS, serde_json::json!({})));
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["active_entries"], Value::from(1));
    }
}
