//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the helper
//! daemon. All types derive Serde traits for deserialization from config
//! files, and every field has a default so a minimal config is valid.

use serde::{Deserialize, Serialize};

use crate::ipc::protocol;

/// Root configuration for the hosts-file helper.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HelperConfig {
    /// IPC listener configuration (socket path).
    pub listener: ListenerConfig,

    /// Managed hosts file settings.
    pub hosts: HostsConfig,

    /// Trust-boundary enforcement settings.
    pub security: SecurityConfig,

    /// Backup directory and retention settings.
    pub backup: BackupConfig,

    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// IPC listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Unix socket path the helper listens on.
    pub socket_path: String,

    /// Service name reported in status responses.
    pub service_name: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/run/hosts-helper/helper.sock".to_string(),
            service_name: "hosts-helper".to_string(),
        }
    }
}

/// Managed hosts file settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostsConfig {
    /// Path of the hosts file the helper is allowed to mutate.
    pub hosts_path: String,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            hosts_path: "/etc/hosts".to_string(),
        }
    }
}

/// Trust-boundary enforcement configuration.
///
/// Loaded once at startup and immutable thereafter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Sliding-window rate limit threshold per client.
    pub max_requests_per_minute: u32,

    /// How long a rate-limit offender stays blacklisted, in seconds.
    pub blacklist_duration_secs: u64,

    /// Require client authentication at the transport layer.
    pub require_auth: bool,

    /// Operations the helper will accept. Anything else is rejected even
    /// if otherwise well-formed.
    pub allowed_operations: Vec<String>,

    /// Client identifiers that bypass rate limiting and blacklist checks.
    pub trusted_clients: Vec<String>,

    /// Maximum host entries accepted in a single write_hosts request.
    pub max_host_entries: usize,

    /// Validate hostname syntax and dangerous-name patterns.
    pub validate_hostnames: bool,

    /// Validate IP syntax and dangerous-address classes.
    pub validate_ips: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 60,
            blacklist_duration_secs: 15 * 60,
            require_auth: true,
            allowed_operations: protocol::default_allowed_operations(),
            trusted_clients: Vec::new(),
            max_host_entries: 1000,
            validate_hostnames: true,
            validate_ips: true,
        }
    }
}

/// Backup directory and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory where backup files and the index live.
    pub backup_dir: String,

    /// Retention limit. After every create, the oldest backups are evicted
    /// until the count equals this limit.
    pub max_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: "/var/lib/hosts-helper/backups".to_string(),
            max_backups: 10,
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only audit log path.
    pub log_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: "/var/log/hosts-helper/audit.log".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
