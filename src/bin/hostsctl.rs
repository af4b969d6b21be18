//! Control CLI for the hosts helper daemon.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use hosts_helper::ipc::{HelperClient, Response};

#[derive(Parser)]
#[command(name = "hostsctl")]
#[command(about = "Control CLI for the hosts helper daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "/run/hosts-helper/helper.sock")]
    socket: PathBuf,

    #[arg(short, long, default_value = "hostsctl")]
    client_id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and counters
    Status,
    /// Check the hosts file for structural problems
    Validate,
    /// Create a backup of the hosts file
    Backup {
        /// Name prefix for the backup id
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Restore a backup over the hosts file
    Restore {
        /// Backup id as reported by `backup` or `status`
        backup_id: String,
        /// Restore somewhere other than the original path
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Replace the hosts file with entries read from a JSON file
    Write {
        /// Path to a JSON array of {ip, hostname, comment?, enabled} objects
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = HelperClient::new(&cli.socket, cli.client_id.as_str());

    let response = match cli.command {
        Commands::Status => client.get_status().await?,
        Commands::Validate => client.validate_hosts().await?,
        Commands::Backup { name } => client.backup_hosts(name.as_deref()).await?,
        Commands::Restore { backup_id, target } => {
            client.restore_hosts(&backup_id, target.as_deref()).await?
        }
        Commands::Write { file } => {
            let content = std::fs::read_to_string(&file)?;
            let entries: Value = serde_json::from_str(&content)?;
            client.write_hosts(entries).await?
        }
    };

    print_response(&response)?;
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_response(response: &Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(error) = &response.error {
        eprintln!("Error: {}", error);
        return Ok(());
    }
    if let Some(data) = &response.data {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        println!("ok");
    }
    Ok(())
}
