//! tradeops-sales - Sales ingestion and dashboard service
//!
//! Ingests marketplace transaction/earnings export pairs, resolves custom
//! labels to catalog SKUs, and commits a cleaned ledger that the dashboard
//! endpoints aggregate over. Serves HTTP REST + SSE.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use tradeops_common::events::EventBus;

use tradeops_sales::AppState;

/// Command-line arguments for tradeops-sales
#[derive(Parser, Debug)]
#[command(name = "tradeops-sales")]
#[command(about = "Sales ingestion and dashboard service for TradeOps")]
#[command(version)]
struct Args {
    /// Root folder holding the database and configuration
    #[arg(short, long, env = "TRADEOPS_ROOT")]
    root_folder: Option<String>,

    /// Port to listen on; overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Starting tradeops-sales (sales ingestion) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve root folder: CLI flag, then environment, then config file
    let root_folder = tradeops_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "TRADEOPS_ROOT",
        Some("root_folder"),
    )?;
    tradeops_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Root folder: {}", root_folder.display());

    let mut config = tradeops_common::config::load_service_config(&root_folder)?;
    if let Some(port) = args.port {
        config.port = port;
    }

    // Open or create database
    let db_path = tradeops_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = tradeops_sales::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Batches caught mid-stage by the previous shutdown restart from error
    let interrupted = tradeops_sales::db::batches::recover_interrupted(&db_pool).await?;
    for batch_id in &interrupted {
        warn!(batch_id = %batch_id, "Batch was mid-stage at shutdown; parked in error");
    }

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity
    info!("Event bus initialized");

    let allocator = tradeops_sales::services::allocator::allocator_from_config(&config)?;

    let port = config.port;
    let state = AppState::new(db_pool, event_bus, config, allocator);
    let app = tradeops_sales::build_router(state);

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
