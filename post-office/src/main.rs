//! Queue runner and operator commands
//!
//! ```bash
//! # Process the queue until interrupted
//! post-office --config post-office.toml run
//!
//! # Single pass over the queue
//! post-office send-queued
//!
//! # Operator actions
//! post-office requeue 12 13
//! post-office mark-sent 14
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use post_office::config::{Config, LoggingConfig};
use post_office::PostOffice;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "post-office")]
#[command(about = "Templated transactional email queue", long_about = None)]
struct Cli {
    /// Configuration file (TOML); POST_OFFICE__* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the queue until interrupted
    Run,
    /// Send every due email once and exit
    SendQueued,
    /// Put failed or sent emails back in the queue
    Requeue {
        /// Email ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Mark emails as sent without sending them
    MarkSent {
        /// Email ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging);

    info!("Configuration loaded");
    info!("  Database: {}", config.database.url);
    info!("  SMTP relay: {}", config.smtp.relay_addr);
    info!("  Attachments path: {}", config.storage.attachments_path);
    info!("  Workers: {}", config.queue.partitions());

    let post_office = PostOffice::from_config(&config).await?;

    match cli.command {
        Commands::Run => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Cannot listen for shutdown signal: {}", e);
                    return;
                }
                info!("Shutdown requested, finishing the current pass");
                signal.cancel();
            });

            post_office.scheduler.run(shutdown).await?;
        }
        Commands::SendQueued => {
            post_office.scheduler.recover().await?;
            let summary = post_office.scheduler.run_once().await?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Requeue { ids } => {
            let count = post_office.outbox.requeue(&ids).await?;
            println!("✓ Requeued {} email(s)", count);
        }
        Commands::MarkSent { ids } => {
            let count = post_office.outbox.mark_as_sent(&ids).await?;
            println!("✓ Marked {} email(s) as sent", count);
        }
    }

    Ok(())
}
