//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HelperConfig (validated, immutable)
//!     → shared by value with the dispatcher at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a daemon restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuditConfig, BackupConfig, HelperConfig, HostsConfig, ListenerConfig, ObservabilityConfig,
    SecurityConfig,
};
