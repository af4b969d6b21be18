//! Unix-domain-socket listener for the helper.
//!
//! # Data Flow
//! ```text
//! accept -> spawn connection task -> read JSON line -> dispatch -> write JSON line
//! ```
//!
//! # Design Decisions
//! - One JSON object per line in each direction; connections may pipeline
//!   multiple requests sequentially.
//! - Malformed JSON produces an error response instead of dropping the
//!   connection; only I/O errors end a connection.
//! - A stale socket file from a previous run is removed before binding.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::ipc::protocol::{Request, Response};
use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to create socket directory {path}: {source}")]
    SocketDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The IPC listener. Owns the socket path and the shared dispatcher.
pub struct IpcServer {
    socket_path: PathBuf,
    dispatcher: Arc<Dispatcher>,
}

impl IpcServer {
    pub fn new(socket_path: impl Into<PathBuf>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            socket_path: socket_path.into(),
            dispatcher,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until the shutdown signal fires, then unlink the
    /// socket. In-flight connection tasks finish their current request on
    /// their own.
    pub async fn run(&self, shutdown: Arc<Shutdown>) -> Result<(), ServerError> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServerError::SocketDir {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        // Stale socket from an unclean previous exit.
        let _ = tokio::fs::remove_file(&self.socket_path).await;

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| ServerError::Bind {
            path: self.socket_path.clone(),
            source: e,
        })?;

        tracing::info!(socket = %self.socket_path.display(), "listening");

        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown signal received, closing listener");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tokio::spawn(async move {
                                let connection_id = Uuid::new_v4();
                                if let Err(e) = handle_connection(stream, dispatcher, connection_id).await {
                                    tracing::warn!(%connection_id, error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }

        let _ = tokio::fs::remove_file(&self.socket_path).await;
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher>,
    connection_id: Uuid,
) -> io::Result<()> {
    tracing::debug!(%connection_id, "connection opened");

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                tracing::debug!(
                    %connection_id,
                    client = %request.client_id,
                    operation = %request.operation,
                    "request received"
                );
                dispatcher.handle(&request)
            }
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "malformed request");
                Response::rejected("VALIDATION_FAILED", &format!("malformed request: {}", e))
            }
        };

        let mut encoded = serde_json::to_string(&response)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
    }

    tracing::debug!(%connection_id, "connection closed");
    Ok(())
}
