//! Client side of the helper IPC channel.
//!
//! Used by the control binary and by integration tests. Each call opens a
//! fresh connection, sends one request line and reads one response line.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::ipc::protocol::{
    Request, Response, OP_BACKUP_HOSTS, OP_GET_STATUS, OP_RESTORE_HOSTS, OP_VALIDATE_HOSTS,
    OP_WRITE_HOSTS,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A thin caller over the helper socket.
pub struct HelperClient {
    socket_path: PathBuf,
    client_id: String,
}

impl HelperClient {
    pub fn new(socket_path: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            client_id: client_id.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one request and wait for its response.
    pub async fn call(
        &self,
        operation: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<Response, ClientError> {
        let request = Request::new(operation, &self.client_id, parameters);

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ClientError::Connect {
                path: self.socket_path.clone(),
                source: e,
            })?;
        let (reader, mut writer) = stream.into_split();

        let mut encoded = serde_json::to_string(&request).map_err(ClientError::Encode)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(ClientError::ConnectionClosed);
        }

        serde_json::from_str(&line).map_err(ClientError::Decode)
    }

    pub async fn get_status(&self) -> Result<Response, ClientError> {
        self.call(OP_GET_STATUS, HashMap::new()).await
    }

    pub async fn validate_hosts(&self) -> Result<Response, ClientError> {
        self.call(OP_VALIDATE_HOSTS, HashMap::new()).await
    }

    pub async fn backup_hosts(&self, name: Option<&str>) -> Result<Response, ClientError> {
        let mut parameters = HashMap::new();
        if let Some(name) = name {
            parameters.insert("name".to_string(), Value::from(name));
        }
        self.call(OP_BACKUP_HOSTS, parameters).await
    }

    pub async fn restore_hosts(
        &self,
        backup_id: &str,
        target_path: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut parameters = HashMap::new();
        parameters.insert("backup_id".to_string(), Value::from(backup_id));
        if let Some(target) = target_path {
            parameters.insert("target_path".to_string(), Value::from(target));
        }
        self.call(OP_RESTORE_HOSTS, parameters).await
    }

    pub async fn write_hosts(&self, entries: Value) -> Result<Response, ClientError> {
        let mut parameters = HashMap::new();
        parameters.insert("entries".to_string(), entries);
        self.call(OP_WRITE_HOSTS, parameters).await
    }
}
