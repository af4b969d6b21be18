//! Helper daemon entry point.
//!
//! Wires configuration, audit trail, security pipeline, backup registry and
//! the IPC listener together, then runs until a termination signal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use hosts_helper::audit::{AuditSink, FileAuditSink};
use hosts_helper::backup::BackupManager;
use hosts_helper::config::{load_config, HelperConfig};
use hosts_helper::dispatch::Dispatcher;
use hosts_helper::hosts::HostsFile;
use hosts_helper::ipc::IpcServer;
use hosts_helper::lifecycle::{signals, Shutdown};
use hosts_helper::observability::init_logging;
use hosts_helper::security::RequestValidator;

#[derive(Parser)]
#[command(name = "hostsd")]
#[command(about = "Privileged hosts-file helper daemon", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => HelperConfig::default(),
    };

    init_logging(&config.observability.log_level);

    tracing::info!(
        socket = %config.listener.socket_path,
        hosts_path = %config.hosts.hosts_path,
        backup_dir = %config.backup.backup_dir,
        max_requests_per_minute = config.security.max_requests_per_minute,
        "configuration loaded"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(FileAuditSink::open(&config.audit.log_path)?);
    let validator = RequestValidator::new(config.security.clone(), audit.clone());
    let backups = BackupManager::new(&config.backup.backup_dir, config.backup.max_backups)?;
    let hosts = HostsFile::new(&config.hosts.hosts_path);

    let dispatcher = Arc::new(Dispatcher::new(
        validator,
        backups,
        hosts,
        audit,
        config.listener.service_name.clone(),
    ));

    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn(signals::handle_signals(shutdown.clone()));

    let server = IpcServer::new(&config.listener.socket_path, dispatcher);
    server.run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
