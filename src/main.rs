use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;

use airbyte_client::observability::{init_logging, LogFormat, LogLevel, LoggingConfig};
use airbyte_client::services::WorkspacesService;
use airbyte_client::{AirbyteClient, SyncReport};

#[derive(Parser)]
#[command(
    name = "airbyte-sync",
    version,
    about = "Bulk sync and workspace tooling for the Airbyte API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Log format (pretty, json, compact)
    #[arg(long, default_value = "compact", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger syncs for the connections listed in a YAML file
    BulkSync {
        /// YAML file with a `connections` list
        config_file: PathBuf,
        /// Maximum syncs in flight
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
    /// Check that the API is reachable
    Health,
    /// Export a workspace's sources, destinations and connections as YAML
    Export {
        /// Workspace identifier
        workspace_id: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct BulkSyncFile {
    connections: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(
        &LoggingConfig::new()
            .with_level(cli.log_level)
            .with_format(cli.log_format),
    )
    .map_err(anyhow::Error::msg)?;

    let client = AirbyteClient::from_env().context("failed to create Airbyte client")?;

    match cli.command {
        Commands::BulkSync {
            config_file,
            max_concurrent,
        } => bulk_sync(&client, &config_file, max_concurrent).await,
        Commands::Health => {
            if client.health_check().await {
                println!("healthy");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("unhealthy");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Export {
            workspace_id,
            output,
        } => export(&client, &workspace_id, output.as_deref()).await,
    }
}

async fn bulk_sync(
    client: &AirbyteClient,
    config_file: &Path,
    max_concurrent: Option<usize>,
) -> anyhow::Result<ExitCode> {
    let raw = std::fs::read_to_string(config_file)
        .with_context(|| format!("failed to read {}", config_file.display()))?;
    let file: BulkSyncFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", config_file.display()))?;

    let results = client.bulk_sync(&file.connections, max_concurrent).await;
    let report = SyncReport::from_results(
        file.connections
            .iter()
            .map(String::as_str)
            .zip(results.iter()),
    );

    print_report(&report);

    if report.failure_count() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "{:<38} {:<10} {:>12} {:>15}",
        "Connection ID", "Status", "Duration (s)", "Records Synced"
    );
    for row in &report.rows {
        let duration = row
            .duration_seconds
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<10} {:>12} {:>15}",
            row.connection_id, row.status, duration, row.records_synced
        );
        if let Some(error) = &row.error {
            println!("  error: {}", error);
        }
    }
}

async fn export(
    client: &AirbyteClient,
    workspace_id: &str,
    output: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let export = client
        .workspaces()
        .export(workspace_id)
        .await
        .with_context(|| format!("failed to export workspace {}", workspace_id))?;
    let yaml = export.to_yaml()?;

    match output {
        Some(path) => {
            std::fs::write(path, yaml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported workspace {} to {}", workspace_id, path.display());
        }
        None => print!("{}", yaml),
    }

    Ok(ExitCode::SUCCESS)
}
