//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rate limit > 0, retention >= 1)
//! - Check that trust-boundary settings are coherent
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: HelperConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::path::Path;

use crate::config::schema::HelperConfig;

/// A single semantic validation failure, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the config field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a loaded configuration, collecting every error.
pub fn validate_config(config: &HelperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !Path::new(&config.listener.socket_path).is_absolute() {
        errors.push(ValidationError::new(
            "listener.socket_path",
            "must be an absolute path",
        ));
    }
    if config.listener.service_name.is_empty() {
        errors.push(ValidationError::new(
            "listener.service_name",
            "must not be empty",
        ));
    }

    if !Path::new(&config.hosts.hosts_path).is_absolute() {
        errors.push(ValidationError::new(
            "hosts.hosts_path",
            "must be an absolute path",
        ));
    }

    if config.security.max_requests_per_minute == 0 {
        errors.push(ValidationError::new(
            "security.max_requests_per_minute",
            "must be greater than zero",
        ));
    }
    if config.security.blacklist_duration_secs == 0 {
        errors.push(ValidationError::new(
            "security.blacklist_duration_secs",
            "must be greater than zero",
        ));
    }
    if config.security.allowed_operations.is_empty() {
        errors.push(ValidationError::new(
            "security.allowed_operations",
            "must list at least one operation",
        ));
    }
    if config.security.max_host_entries == 0 {
        errors.push(ValidationError::new(
            "security.max_host_entries",
            "must be greater than zero",
        ));
    }

    if !Path::new(&config.backup.backup_dir).is_absolute() {
        errors.push(ValidationError::new(
            "backup.backup_dir",
            "must be an absolute path",
        ));
    }
    if config.backup.max_backups == 0 {
        errors.push(ValidationError::new(
            "backup.max_backups",
            "must keep at least one backup",
        ));
    }

    if !Path::new(&config.audit.log_path).is_absolute() {
        errors.push(ValidationError::new(
            "audit.log_path",
            "must be an absolute path",
        ));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!(
                "unknown level {:?}, expected one of {}",
                config.observability.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
