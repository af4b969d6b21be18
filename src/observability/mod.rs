//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → Log aggregation (stdout, journald capture)
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing; the audit trail is separate and
//!   append-only, logging here is operator-facing only
//! - Log level configurable via config, overridable via RUST_LOG

pub mod logging;

pub use logging::init_logging;
