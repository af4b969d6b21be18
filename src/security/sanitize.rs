//! Stateless parameter sanitizers.
//!
//! Pure functions with no shared state. Every rejection is a
//! `SecurityError::ValidationFailed` carrying a caller-readable message.

use std::net::IpAddr;
use std::path::{Component, Path};

use serde_json::{Map, Value};

use crate::security::SecurityError;

/// RFC 1035 limit for a full hostname.
pub const MAX_HOSTNAME_LEN: usize = 253;
/// RFC 1035 limit for a single label.
pub const MAX_LABEL_LEN: usize = 63;
/// Maximum length of a host entry comment.
pub const MAX_COMMENT_LEN: usize = 200;

/// Substrings treated as attempts to redirect trusted local names.
const DANGEROUS_HOSTNAME_SUBSTRINGS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

fn invalid(message: impl Into<String>) -> SecurityError {
    SecurityError::ValidationFailed(message.into())
}

/// Validate an IP address string.
///
/// Must parse as IPv4 or IPv6; multicast and unspecified addresses are
/// rejected as dangerous targets for a hosts entry.
pub fn validate_ip(ip: &str) -> Result<(), SecurityError> {
    let parsed: IpAddr = ip
        .parse()
        .map_err(|_| invalid(format!("invalid IP address format: {}", ip)))?;

    if parsed.is_multicast() || parsed.is_unspecified() {
        return Err(invalid(format!("dangerous IP address not allowed: {}", ip)));
    }

    Ok(())
}

/// Validate a hostname against the label-dot-label grammar and the
/// dangerous-name patterns.
pub fn validate_hostname(hostname: &str) -> Result<(), SecurityError> {
    if hostname.is_empty() {
        return Err(invalid("hostname is empty"));
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(invalid(format!(
            "hostname too long: {} (max {})",
            hostname.len(),
            MAX_HOSTNAME_LEN
        )));
    }

    for label in hostname.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid(format!("invalid hostname format: {}", hostname)));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid(format!("invalid hostname format: {}", hostname)));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid(format!("invalid hostname format: {}", hostname)));
        }
    }

    if is_dangerous_hostname(hostname) {
        return Err(invalid(format!("dangerous hostname not allowed: {}", hostname)));
    }

    Ok(())
}

fn is_dangerous_hostname(hostname: &str) -> bool {
    let lowered = hostname.to_ascii_lowercase();
    if DANGEROUS_HOSTNAME_SUBSTRINGS
        .iter()
        .any(|p| lowered.contains(p))
    {
        return true;
    }
    // The *.local pattern: anything under the mDNS domain.
    lowered == "local" || lowered.ends_with(".local")
}

/// Validate an optional host entry comment.
pub fn validate_comment(comment: &str) -> Result<(), SecurityError> {
    if comment.len() > MAX_COMMENT_LEN {
        return Err(invalid(format!(
            "comment too long: {} (max {} characters)",
            comment.len(),
            MAX_COMMENT_LEN
        )));
    }
    Ok(())
}

/// Validate a single raw host entry object from request parameters.
pub fn validate_host_entry(
    entry: &Map<String, Value>,
    validate_ips: bool,
    validate_hostnames: bool,
) -> Result<(), SecurityError> {
    let ip = entry
        .get("ip")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing or invalid ip"))?;

    let hostname = entry
        .get("hostname")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing or invalid hostname"))?;

    if validate_ips {
        validate_ip(ip)?;
    }
    if validate_hostnames {
        validate_hostname(hostname)?;
    }
    if let Some(comment) = entry.get("comment").and_then(Value::as_str) {
        validate_comment(comment)?;
    }

    Ok(())
}

/// Validate a bulk `entries` parameter.
///
/// The first failing element aborts the batch; nothing is partially applied.
pub fn validate_entries(
    entries: &Value,
    max_entries: usize,
    validate_ips: bool,
    validate_hostnames: bool,
) -> Result<(), SecurityError> {
    let list = entries
        .as_array()
        .ok_or_else(|| invalid("entries must be an array"))?;

    if list.len() > max_entries {
        return Err(invalid(format!(
            "too many host entries: {} (max {})",
            list.len(),
            max_entries
        )));
    }

    for (i, element) in list.iter().enumerate() {
        let object = element
            .as_object()
            .ok_or_else(|| invalid(format!("entry {} is not a valid object", i)))?;
        validate_host_entry(object, validate_ips, validate_hostnames)
            .map_err(|e| invalid(format!("entry {} validation failed: {}", i, e)))?;
    }

    Ok(())
}

/// Validate a file path supplied for a restore operation.
///
/// Must be absolute, free of `..` traversal segments, and reference an
/// existing file.
pub fn validate_file_path(path: &str) -> Result<(), SecurityError> {
    let path_ref = Path::new(path);

    if path_ref
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(invalid("path traversal not allowed"));
    }
    if !path_ref.is_absolute() {
        return Err(invalid("only absolute paths allowed"));
    }
    if !path_ref.is_file() {
        return Err(invalid(format!("file does not exist: {}", path)));
    }

    Ok(())
}

/// Validate a restore target path. The target need not exist, but it must
/// be absolute and traversal-free.
pub fn validate_target_path(path: &str) -> Result<(), SecurityError> {
    let path_ref = Path::new(path);

    if path_ref
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(invalid("path traversal not allowed"));
    }
    if !path_ref.is_absolute() {
        return Err(invalid("only absolute paths allowed"));
    }

    Ok(())
}
