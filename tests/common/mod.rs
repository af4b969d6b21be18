//! Shared utilities for integration testing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use hosts_helper::audit::{AuditSink, MemoryAuditSink};
use hosts_helper::backup::BackupManager;
use hosts_helper::config::SecurityConfig;
use hosts_helper::dispatch::Dispatcher;
use hosts_helper::hosts::HostsFile;
use hosts_helper::ipc::{HelperClient, IpcServer};
use hosts_helper::lifecycle::Shutdown;
use hosts_helper::security::RequestValidator;

#[allow(dead_code)]
pub const INITIAL_HOSTS: &str = "127.0.0.1 localhost\n::1 localhost\n";

/// Everything a test needs to talk to a fully wired helper.
pub struct TestEnv {
    pub dir: TempDir,
    pub dispatcher: Arc<Dispatcher>,
    pub audit: Arc<MemoryAuditSink>,
    pub hosts_path: PathBuf,
}

/// Build a dispatcher over a fresh temp directory with the given security
/// settings. The hosts file starts with `INITIAL_HOSTS`.
pub fn build_env(security: SecurityConfig) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let hosts_path = dir.path().join("hosts");
    std::fs::write(&hosts_path, INITIAL_HOSTS).unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let sink: Arc<dyn AuditSink> = audit.clone();

    let validator = RequestValidator::new(security, sink.clone());
    let backups = BackupManager::new(dir.path().join("backups"), 10).unwrap();
    let hosts = HostsFile::new(&hosts_path);
    let dispatcher = Arc::new(Dispatcher::new(
        validator,
        backups,
        hosts,
        sink,
        "hosts-helper-test",
    ));

    TestEnv {
        dir,
        dispatcher,
        audit,
        hosts_path,
    }
}

#[allow(dead_code)]
pub fn default_env() -> TestEnv {
    build_env(SecurityConfig::default())
}

/// Start an IPC server for the environment and return a connected client.
/// The server task winds down when the returned `Shutdown` is triggered.
#[allow(dead_code)]
pub async fn start_server(env: &TestEnv, client_id: &str) -> (HelperClient, Arc<Shutdown>) {
    let socket_path = env.dir.path().join("helper.sock");
    let server = IpcServer::new(&socket_path, env.dispatcher.clone());
    let shutdown = Arc::new(Shutdown::new());

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(server_shutdown).await;
    });

    // Wait for the socket to appear.
    for _ in 0..100 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    (HelperClient::new(&socket_path, client_id), shutdown)
}
