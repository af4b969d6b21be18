//! Privileged hosts-file helper.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 HOSTS HELPER                   │
//!                       │                                                │
//!   Client Request      │  ┌─────────┐   ┌───────────┐   ┌──────────┐  │
//!   ────────────────────┼─▶│   ipc   │──▶│ security  │──▶│ dispatch │  │
//!                       │  │ server  │   │ validator │   │          │  │
//!                       │  └─────────┘   └───────────┘   └────┬─────┘  │
//!                       │                                      │        │
//!                       │                     ┌────────────────┼─────┐  │
//!                       │                     ▼                ▼      │  │
//!                       │               ┌──────────┐    ┌──────────┐ │  │
//!                       │               │  backup  │    │  hosts   │ │  │
//!                       │               │ registry │    │   file   │ │  │
//!                       │               └──────────┘    └──────────┘ │  │
//!                       │                                            │  │
//!                       │  ┌──────────────────────────────────────┐  │  │
//!                       │  │         Cross-Cutting Concerns        │  │  │
//!                       │  │  config   audit   observability       │  │  │
//!                       │  │           lifecycle                   │  │  │
//!                       │  └──────────────────────────────────────┘  │  │
//!                       └───────────────────────────────────────────────┘
//! ```
//!
//! Every request passes the full security pipeline before any handler runs;
//! every mutation of the hosts file is preceded by a checksummed backup and
//! followed by an audit record.

pub mod audit;
pub mod backup;
pub mod config;
pub mod dispatch;
pub mod hosts;
pub mod ipc;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::HelperConfig;
pub use dispatch::Dispatcher;
pub use ipc::{HelperClient, IpcServer, Request, Response};
pub use lifecycle::Shutdown;
