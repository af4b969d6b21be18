//! Wire types for the helper IPC channel.
//!
//! Requests and responses are JSON objects, one per line. Field names here
//! are the canonical protocol surface; everything else in the helper is an
//! implementation detail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation names accepted by the helper.
pub const OP_WRITE_HOSTS: &str = "write_hosts";
pub const OP_BACKUP_HOSTS: &str = "backup_hosts";
pub const OP_RESTORE_HOSTS: &str = "restore_hosts";
pub const OP_VALIDATE_HOSTS: &str = "validate_hosts";
pub const OP_GET_STATUS: &str = "get_status";

/// The default operation allow-list.
pub fn default_allowed_operations() -> Vec<String> {
    vec![
        OP_WRITE_HOSTS.to_string(),
        OP_BACKUP_HOSTS.to_string(),
        OP_RESTORE_HOSTS.to_string(),
        OP_VALIDATE_HOSTS.to_string(),
        OP_GET_STATUS.to_string(),
    ]
}

/// An inbound request. Immutable once received; consumed exactly once by
/// the validation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Requested operation name.
    pub operation: String,

    /// Opaque identifier of the calling process/session.
    pub client_id: String,

    /// Operation parameters, keyed by name.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,

    /// Client-side creation instant, RFC3339 on the wire. Used for
    /// staleness and clock-skew rejection.
    pub timestamp: DateTime<Utc>,
}

impl Request {
    /// Build a request stamped with the current instant.
    pub fn new(
        operation: impl Into<String>,
        client_id: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> Self {
        Self {
            operation: operation.into(),
            client_id: client_id.into(),
            parameters,
            timestamp: Utc::now(),
        }
    }
}

/// An outbound response, constructed by the dispatcher or, on rejection,
/// by the validator path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the operation was performed.
    pub success: bool,

    /// Operation-specific result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, Value>>,

    /// `CODE: message` on failure, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Helper-side response instant.
    pub timestamp: DateTime<Utc>,
}

impl Response {
    /// Successful response carrying a result payload.
    pub fn ok(data: HashMap<String, Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed response with a symbolic error code and message.
    pub fn rejected(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(format!("{}: {}", code, message)),
            timestamp: Utc::now(),
        }
    }

    /// Symbolic code portion of the error, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.error
            .as_deref()
            .and_then(|e| e.split(':').next())
            .map(str::trim)
    }
}

/// A single hosts-file entry as carried in `write_hosts` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub ip: String,
    pub hostname: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub enabled: bool,
}
