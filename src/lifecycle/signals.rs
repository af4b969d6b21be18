//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate signals to the internal shutdown event
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Both signals mean the same thing for a small helper: stop accepting
//!   and exit cleanly

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::shutdown::Shutdown;

/// Wait for SIGTERM or SIGINT and trigger shutdown.
///
/// Runs until the first signal arrives; callers spawn it once at startup.
pub async fn handle_signals(shutdown: Arc<Shutdown>) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to register SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to register SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received, shutting down");
        }
        _ = sigint.recv() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    shutdown.trigger();
}
