//! Filestream ingestion handler.
//!
//! Handles "file added" events: each file is ingested into the analytical
//! sink at most once, its outcome is recorded in the ledger, and a message
//! goes out on the success or error channel.
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP trigger endpoint
//! GCP_PROJECT=acme filestream-ingest serve
//!
//! # Handle a single event from the command line
//! GCP_PROJECT=acme filestream-ingest handle --bucket landing --name orders/2021-01-01.json
//!
//! # Inspect the ledger record of one file
//! filestream-ingest show --name orders/2021-01-01.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filestream_core::FileEvent;
use filestream_core::metrics::{init_metrics, start_metrics_server};
use filestream_ingest::{
    ClickHouseSink, Config, Handled, Ledger, PubSubPublisher, RocksLedger, S3ObjectStore,
    StreamingHandler, server,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Filestream ingestion handler.
#[derive(Parser, Debug)]
#[command(name = "filestream-ingest")]
#[command(about = "Ingest newly added files into the analytical sink exactly once")]
#[command(version)]
struct Args {
    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP trigger endpoint
    Serve {
        /// Create the sink table if it does not exist
        #[arg(long)]
        ensure_table: bool,
    },

    /// Handle one event and exit
    Handle {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        name: String,
    },

    /// Print the ledger record of a file
    Show {
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv))?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,filestream_ingest=debug")),
        )
        .init();

    match args.command {
        // Reading the ledger needs neither the sink nor the notification bus
        Command::Show { name } => {
            let ledger = open_ledger(&Config::ledger_path_from_env())?;
            show(&ledger, &name).await
        }
        Command::Handle { bucket, name } => {
            let (config, ledger) = prepare(args.metrics_port).await?;
            let handler = build_handler(&config, ledger.clone()).await?;
            let handled = handler
                .handle(&FileEvent::new(bucket, name))
                .await
                .context("Invocation aborted")?;
            ledger.flush()?;
            println!("{}", serde_json::to_string(&handled)?);
            if let Handled::Failed { error_detail } = handled {
                tracing::warn!("Ingestion failed and was recorded: {}", error_detail);
            }
            Ok(())
        }
        Command::Serve { ensure_table } => {
            let (config, ledger) = prepare(args.metrics_port).await?;
            if ensure_table {
                ClickHouseSink::new(config.clickhouse())
                    .ensure_table(&config.table)
                    .await
                    .context("Failed to create sink table")?;
            }
            let handler = build_handler(&config, ledger.clone()).await?;
            serve(&config.bind_addr, handler).await?;
            ledger.flush()?;
            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}

/// Load the full configuration, start metrics, and open the ledger.
async fn prepare(metrics_port: u16) -> Result<(Config, Arc<RocksLedger>)> {
    let config = Config::from_env()?;

    if metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(metrics_port, metrics_handle).await?;
    }

    let ledger = Arc::new(open_ledger(&config.ledger_path)?);
    Ok((config, ledger))
}

fn open_ledger(path: &Path) -> Result<RocksLedger> {
    RocksLedger::open(path).with_context(|| format!("Failed to open ledger at {:?}", path))
}

/// Wire the production collaborators into a handler.
async fn build_handler(config: &Config, ledger: Arc<RocksLedger>) -> Result<StreamingHandler> {
    let store = Arc::new(S3ObjectStore::from_env(config.s3_endpoint.as_deref()).await);

    let sink = ClickHouseSink::new(config.clickhouse());
    match sink.health_check().await {
        Ok(true) => tracing::info!("ClickHouse reachable at {}", config.clickhouse_url),
        Ok(false) | Err(_) => tracing::warn!(
            "ClickHouse not reachable at {}; inserts will be retried per event",
            config.clickhouse_url
        ),
    }

    let publisher = PubSubPublisher::new(config.pubsub(), config.topics())
        .context("Failed to create Pub/Sub publisher")?;

    tracing::info!("Configuration:");
    tracing::info!("  Ledger: {}", config.ledger_path.display());
    tracing::info!("  Sink table: {}", config.table);
    tracing::info!("  Insert deadline: {:?}", config.insert_deadline);
    tracing::info!("  Success topic: {}", config.topics().success);
    tracing::info!("  Error topic: {}", config.topics().error);

    Ok(StreamingHandler::new(
        ledger,
        store,
        Arc::new(sink),
        Arc::new(publisher),
        config.table.clone(),
        config.insert_deadline,
    ))
}

async fn serve(bind_addr: &str, handler: StreamingHandler) -> Result<()> {
    let app = server::router(handler).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "starting trigger server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            tracing::info!("Shutdown signal received, stopping gracefully...");
        })
        .await?;

    Ok(())
}

async fn show(ledger: &dyn Ledger, name: &str) -> Result<()> {
    let key = filestream_core::ledger_key(name);
    match ledger.get(&key).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!("No ledger record for '{}'", name),
    }
}
