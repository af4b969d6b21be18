//! Trust-boundary enforcement subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → validator.rs (structural checks, timestamp freshness)
//!     → reputation.rs (blacklist / whitelist)
//!     → rate_limit.rs (per-client sliding window)
//!     → operation allow-list
//!     → sanitize.rs (IPs, hostnames, paths, bulk entries)
//!     → Pass to dispatch
//! ```
//!
//! # Design Decisions
//! - Checks run strictly in order and short-circuit on first failure
//! - Every rejection emits a SecurityViolation and an audit record
//! - Fail closed: unknown operations and malformed parameters are rejected
//! - No trust in client input

pub mod rate_limit;
pub mod reputation;
pub mod sanitize;
pub mod validator;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use rate_limit::RateLimiter;
pub use reputation::ReputationStore;
pub use validator::{RequestValidator, SecurityStats};

/// Rejection reasons surfaced by the validation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// Malformed or missing fields, oversized batches, invalid parameters.
    #[error("{0}")]
    ValidationFailed(String),

    /// Client is on the blacklist and the entry has not expired.
    #[error("client is blacklisted")]
    ClientBlacklisted,

    /// Too many requests inside the sliding window.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Operation is not on the allow-list.
    #[error("operation not allowed: {0}")]
    OperationNotAllowed(String),

    /// Request timestamp outside the accepted freshness window.
    #[error("{0}")]
    RequestExpired(String),

    /// Catch-all permission rejection.
    #[error("{0}")]
    PermissionDenied(String),
}

impl SecurityError {
    /// Stable symbolic code for the wire and the audit trail.
    pub fn code(&self) -> &'static str {
        match self {
            SecurityError::ValidationFailed(_) => "VALIDATION_FAILED",
            SecurityError::ClientBlacklisted => "CLIENT_BLACKLISTED",
            SecurityError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            SecurityError::OperationNotAllowed(_) => "OPERATION_NOT_ALLOWED",
            SecurityError::RequestExpired(_) => "REQUEST_EXPIRED",
            SecurityError::PermissionDenied(_) => "PERMISSION_DENIED",
        }
    }
}

/// Severity attached to a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Append-only record of a rejected request. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityViolation {
    pub client_id: String,
    /// Which pipeline stage rejected the request.
    pub violation: String,
    pub operation: String,
    pub severity: Severity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityViolation {
    pub fn new(
        client_id: &str,
        violation: &str,
        operation: &str,
        severity: Severity,
        description: String,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            violation: violation.to_string(),
            operation: operation.to_string(),
            severity,
            description,
            timestamp: Utc::now(),
        }
    }
}
