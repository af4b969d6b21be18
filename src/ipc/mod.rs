//! IPC subsystem.
//!
//! # Data Flow
//! ```text
//! client -> Unix socket -> JSON line -> Request -> dispatcher
//! dispatcher -> Response -> JSON line -> Unix socket -> client
//! ```
//!
//! # Responsibilities
//! - Define the wire types (protocol.rs)
//! - Accept and frame connections (server.rs)
//! - Provide a caller for the control binary and tests (client.rs)

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{ClientError, HelperClient};
pub use protocol::{HostEntry, Request, Response};
pub use server::{IpcServer, ServerError};
