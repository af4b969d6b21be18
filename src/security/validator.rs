//! Request validation pipeline.
//!
//! Orchestrates the structural, reputation, rate-limit, allow-list and
//! parameter checks into a single pass/fail decision per request. Checks run
//! strictly in order and short-circuit on the first failure; every failure
//! records a violation and a failed-operation audit record before returning.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::audit::AuditSink;
use crate::config::SecurityConfig;
use crate::ipc::protocol::{
    Request, OP_BACKUP_HOSTS, OP_GET_STATUS, OP_RESTORE_HOSTS, OP_VALIDATE_HOSTS, OP_WRITE_HOSTS,
};
use crate::security::rate_limit::RateLimiter;
use crate::security::reputation::ReputationStore;
use crate::security::{sanitize, SecurityError, SecurityViolation, Severity};

/// Oldest acceptable request age.
const MAX_REQUEST_AGE_SECS: i64 = 5 * 60;
/// Allowed forward clock skew. Deliberately tighter than the age bound:
/// queueing can age a request, but a client should never be far ahead of us.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Counters exposed through `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityStats {
    pub blacklisted_clients: usize,
    pub whitelisted_clients: usize,
    pub rate_tracked_clients: usize,
}

/// The trust-boundary decision point for every inbound request.
pub struct RequestValidator {
    config: SecurityConfig,
    rate_limiter: RateLimiter,
    reputation: ReputationStore,
    audit: Arc<dyn AuditSink>,
}

impl RequestValidator {
    pub fn new(config: SecurityConfig, audit: Arc<dyn AuditSink>) -> Self {
        let rate_limiter = RateLimiter::new(config.max_requests_per_minute);
        let reputation = ReputationStore::new(Duration::from_secs(config.blacklist_duration_secs));
        for client in &config.trusted_clients {
            reputation.add_to_whitelist(client);
        }
        Self {
            config,
            rate_limiter,
            reputation,
            audit,
        }
    }

    /// Pure, synchronous, at-most-once decision per request. Acceptance is
    /// silent; the caller audits success after the operation completes.
    pub fn validate(&self, request: &Request) -> Result<(), SecurityError> {
        if let Err(err) = self.validate_structure(request) {
            self.record_violation(request, "basic_validation", Severity::High, &err);
            return Err(err);
        }

        if self.reputation.is_blacklisted(&request.client_id) {
            let err = SecurityError::ClientBlacklisted;
            self.record_violation(request, "blacklisted", Severity::High, &err);
            return Err(err);
        }

        if !self.reputation.is_whitelisted(&request.client_id)
            && !self.rate_limiter.allow(&request.client_id)
        {
            // Sustained quota violation escalates to a temporary ban.
            self.reputation.blacklist(&request.client_id);
            let err = SecurityError::RateLimitExceeded;
            self.record_violation(request, "rate_limit", Severity::Medium, &err);
            return Err(err);
        }

        if !self
            .config
            .allowed_operations
            .iter()
            .any(|op| op == &request.operation)
        {
            let err = SecurityError::OperationNotAllowed(request.operation.clone());
            self.record_violation(request, "unauthorized_operation", Severity::High, &err);
            return Err(err);
        }

        if let Err(err) = self.validate_parameters(request) {
            self.record_violation(request, "parameter_validation", Severity::Medium, &err);
            return Err(err);
        }

        tracing::debug!(
            client = %request.client_id,
            operation = %request.operation,
            "request validation passed"
        );
        Ok(())
    }

    fn validate_structure(&self, request: &Request) -> Result<(), SecurityError> {
        if request.client_id.is_empty() {
            return Err(SecurityError::ValidationFailed(
                "client ID is empty".to_string(),
            ));
        }
        if request.operation.is_empty() {
            return Err(SecurityError::ValidationFailed(
                "operation is empty".to_string(),
            ));
        }
        if request.timestamp.timestamp() == 0 && request.timestamp.timestamp_subsec_nanos() == 0 {
            return Err(SecurityError::ValidationFailed(
                "timestamp is zero".to_string(),
            ));
        }

        let now = Utc::now();
        let age = now.signed_duration_since(request.timestamp);
        if age.num_seconds() > MAX_REQUEST_AGE_SECS {
            return Err(SecurityError::RequestExpired(
                "request timestamp too old".to_string(),
            ));
        }
        if age.num_seconds() < -MAX_CLOCK_SKEW_SECS {
            return Err(SecurityError::RequestExpired(
                "request timestamp too far in the future".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_parameters(&self, request: &Request) -> Result<(), SecurityError> {
        match request.operation.as_str() {
            OP_WRITE_HOSTS => {
                let entries = request.parameters.get("entries").ok_or_else(|| {
                    SecurityError::ValidationFailed("missing entries parameter".to_string())
                })?;
                sanitize::validate_entries(
                    entries,
                    self.config.max_host_entries,
                    self.config.validate_ips,
                    self.config.validate_hostnames,
                )
            }
            OP_RESTORE_HOSTS => self.validate_restore_parameters(request),
            OP_BACKUP_HOSTS => {
                if let Some(name) = request.parameters.get("name") {
                    if !matches!(name, Value::String(s) if !s.is_empty()) {
                        return Err(SecurityError::ValidationFailed(
                            "name must be a non-empty string".to_string(),
                        ));
                    }
                }
                if let Some(description) = request.parameters.get("description") {
                    if let Some(s) = description.as_str() {
                        sanitize::validate_comment(s)?;
                    } else {
                        return Err(SecurityError::ValidationFailed(
                            "description must be a string".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            OP_VALIDATE_HOSTS | OP_GET_STATUS => Ok(()),
            other => Err(SecurityError::ValidationFailed(format!(
                "unknown operation: {}",
                other
            ))),
        }
    }

    fn validate_restore_parameters(&self, request: &Request) -> Result<(), SecurityError> {
        let backup_id = request.parameters.get("backup_id").and_then(Value::as_str);
        let backup_path = request.parameters.get("backup_path").and_then(Value::as_str);

        match (backup_id, backup_path) {
            (Some(id), _) if !id.is_empty() => {}
            // Legacy parameter: a literal path to the backup file.
            (_, Some(path)) => sanitize::validate_file_path(path)?,
            _ => {
                return Err(SecurityError::ValidationFailed(
                    "backup_id or backup_path parameter is required".to_string(),
                ))
            }
        }

        if let Some(target) = request.parameters.get("target_path").and_then(Value::as_str) {
            sanitize::validate_target_path(target)?;
        }

        Ok(())
    }

    fn record_violation(
        &self,
        request: &Request,
        violation: &str,
        severity: Severity,
        err: &SecurityError,
    ) {
        let record = SecurityViolation::new(
            &request.client_id,
            violation,
            &request.operation,
            severity,
            err.to_string(),
        );
        tracing::error!(
            client = %record.client_id,
            violation = %record.violation,
            operation = %record.operation,
            severity = ?record.severity,
            description = %record.description,
            "security violation detected"
        );
        self.audit.log_failure(
            &request.operation,
            &request.client_id,
            &format!("{}: {}", violation, err),
        );
    }

    pub fn add_to_whitelist(&self, client_id: &str) {
        self.reputation.add_to_whitelist(client_id);
    }

    pub fn remove_from_whitelist(&self, client_id: &str) {
        self.reputation.remove_from_whitelist(client_id);
    }

    pub fn clear_blacklist(&self) {
        self.reputation.clear_blacklist();
    }

    pub fn security_stats(&self) -> SecurityStats {
        let (blacklisted, whitelisted) = self.reputation.counts();
        SecurityStats {
            blacklisted_clients: blacklisted,
            whitelisted_clients: whitelisted,
            rate_tracked_clients: self.rate_limiter.tracked_clients(),
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use std::collections::HashMap;

    fn validator_with_sink() -> (RequestValidator, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let validator = RequestValidator::new(SecurityConfig::default(), sink.clone());
        (validator, sink)
    }

    fn status_request(client_id: &str) -> Request {
        Request::new(OP_GET_STATUS, client_id, HashMap::new())
    }

    #[test]
    fn empty_fields_are_rejected() {
        let (validator, sink) = validator_with_sink();

        let request = status_request("");
        assert!(matches!(
            validator.validate(&request),
            Err(SecurityError::ValidationFailed(_))
        ));

        let mut request = status_request("c1");
        request.operation = String::new();
        assert!(validator.validate(&request).is_err());

        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn stale_and_future_timestamps_are_rejected() {
        let (validator, _) = validator_with_sink();

        let mut old = status_request("c1");
        old.timestamp = Utc::now() - chrono::Duration::minutes(6);
        assert!(matches!(
            validator.validate(&old),
            Err(SecurityError::RequestExpired(_))
        ));

        let mut future = status_request("c1");
        future.timestamp = Utc::now() + chrono::Duration::minutes(2);
        assert!(matches!(
            validator.validate(&future),
            Err(SecurityError::RequestExpired(_))
        ));

        // Inside the asymmetric window both directions pass.
        let mut aged = status_request("c2");
        aged.timestamp = Utc::now() - chrono::Duration::minutes(4);
        assert!(validator.validate(&aged).is_ok());
    }

    #[test]
    fn zero_timestamp_is_rejected() {
        let (validator, _) = validator_with_sink();
        let mut request = status_request("c1");
        request.timestamp = chrono::DateTime::from_timestamp(0, 0).unwrap();
        assert!(matches!(
            validator.validate(&request),
            Err(SecurityError::ValidationFailed(_))
        ));
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let (validator, _) = validator_with_sink();
        let request = Request::new("format_disk", "c1", HashMap::new());
        assert!(matches!(
            validator.validate(&request),
            Err(SecurityError::OperationNotAllowed(_))
        ));
    }

    #[test]
    fn rate_limit_denial_escalates_to_blacklist() {
        let mut config = SecurityConfig::default();
        config.max_requests_per_minute = 3;
        let sink = Arc::new(MemoryAuditSink::new());
        let validator = RequestValidator::new(config, sink.clone());

        for _ in 0..3 {
            assert!(validator.validate(&status_request("c1")).is_ok());
        }
        assert!(matches!(
            validator.validate(&status_request("c1")),
            Err(SecurityError::RateLimitExceeded)
        ));

        // The offender is now banned outright, before the limiter is consulted.
        assert!(matches!(
            validator.validate(&status_request("c1")),
            Err(SecurityError::ClientBlacklisted)
        ));

        // Other clients are unaffected.
        assert!(validator.validate(&status_request("c2")).is_ok());
    }

    #[test]
    fn whitelisted_clients_bypass_rate_limit_and_blacklist() {
        let mut config = SecurityConfig::default();
        config.max_requests_per_minute = 1;
        config.trusted_clients = vec!["trusted".to_string()];
        let validator = RequestValidator::new(config, Arc::new(MemoryAuditSink::new()));

        for _ in 0..10 {
            assert!(validator.validate(&status_request("trusted")).is_ok());
        }

        // Whitelisting after the fact overrides an active blacklist.
        assert!(validator.validate(&status_request("c1")).is_ok());
        assert!(validator.validate(&status_request("c1")).is_err());
        validator.add_to_whitelist("c1");
        assert!(validator.validate(&status_request("c1")).is_ok());
    }

    #[test]
    fn write_hosts_entries_are_sanitized() {
        let (validator, sink) = validator_with_sink();

        let mut params = HashMap::new();
        params.insert(
            "entries".to_string(),
            serde_json::json!([{"ip": "256.1.1.1", "hostname": "ok.example.com"}]),
        );
        let request = Request::new(OP_WRITE_HOSTS, "c1", params);

        let err = validator.validate(&request).unwrap_err();
        assert!(err.to_string().contains("invalid IP address"));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0]
            .reason
            .as_deref()
            .unwrap()
            .starts_with("parameter_validation"));
    }

    #[test]
    fn restore_requires_id_or_path() {
        let (validator, _) = validator_with_sink();

        let request = Request::new(OP_RESTORE_HOSTS, "c1", HashMap::new());
        assert!(validator.validate(&request).is_err());

        let mut params = HashMap::new();
        params.insert("backup_id".to_string(), Value::from("some-id"));
        let request = Request::new(OP_RESTORE_HOSTS, "c1", params);
        assert!(validator.validate(&request).is_ok());

        let mut params = HashMap::new();
        params.insert("backup_path".to_string(), Value::from("/tmp/../etc/hosts"));
        let request = Request::new(OP_RESTORE_HOSTS, "c1", params);
        let err = validator.validate(&request).unwrap_err();
        assert!(err.to_string().contains("traversal"));
    }
}
