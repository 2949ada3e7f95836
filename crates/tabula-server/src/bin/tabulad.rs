//! Tabula Server Daemon
//!
//! The `tabulad` binary is the Tabula server process that:
//! - Opens the record store
//! - Registers the configured tables
//! - Serves the line protocol to TCP clients
//! - Handles graceful shutdown on SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # Start server with default settings (in-memory)
//! tabulad --memory
//!
//! # Start with a data directory
//! tabulad --data-dir /var/lib/tabula
//!
//! # Use configuration file
//! tabulad --config /etc/tabula/tabulad.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tabula_server::config::ServerConfig;
use tabula_server::Server;
use tabula_store::Store;

/// Tabula Server Daemon
#[derive(Parser, Debug)]
#[command(
    name = "tabulad",
    author = "Tabula Team",
    version,
    about = "Tabula record server",
    long_about = "Tabula serves simple, grouped and expiring record tables over a line protocol.\n\n\
                  This daemon opens the store and listens for client connections."
)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "TABULA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, env = "TABULA_PORT")]
    port: Option<u16>,

    /// Data directory for persistent storage
    #[arg(short = 'd', long, value_name = "DIR", env = "TABULA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "TABULA_CONFIG")]
    config: Option<PathBuf>,

    /// Run in memory-only mode (no persistence)
    #[arg(long)]
    memory: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "TABULA_LOG_LEVEL")]
    log_level: String,

    /// Maximum number of connections
    #[arg(long, env = "TABULA_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Skip waiting for durable commits
    #[arg(long)]
    no_sync: bool,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    run_server(config).await
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_new(format!(
        "tabulad={level},tabula_server={level},tabula_store={level},tabula_tables={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("Failed to load config file")?
    } else {
        ServerConfig::default()
    };

    // Command-line arguments win over the file.
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if args.memory {
        config.memory_mode = true;
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }
    if args.no_sync {
        config.sync_writes = false;
    }

    Ok(config)
}

fn open_store(config: &ServerConfig) -> Result<Store> {
    let store_config = config.store_config();
    let store = match store_config.path.clone() {
        Some(path) => {
            info!("Database file: {}", path.display());
            Store::open(store_config).context("Failed to open database")?
        }
        None => {
            info!("Starting in memory-only mode (data will not be persisted)");
            Store::open_memory_with(store_config).context("Failed to create in-memory database")?
        }
    };
    Ok(store)
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let store = Arc::new(open_store(&config)?);
    let registry = Arc::new(
        config
            .build_registry()
            .context("Invalid table configuration")?,
    );

    info!("Server configuration:");
    info!("  Listen address: {}", config.socket_addr());
    info!("  Max connections: {}", config.max_connections);
    info!("  Memory mode: {}", config.memory_mode);
    info!("  Sync writes: {}", config.sync_writes);
    for table in registry.tables() {
        info!(
            "  Table: {} ({})",
            String::from_utf8_lossy(table.name()),
            table.kind()
        );
    }

    let server = Server::bind(&config, Arc::clone(&store), registry)
        .await
        .context("Failed to bind listener")?;

    info!("Press Ctrl+C to shutdown");

    if let Err(e) = server
        .serve_with_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await
    {
        error!("Server error: {}", e);
        return Err(anyhow::anyhow!("Server error: {}", e));
    }

    info!("Shutting down gracefully...");
    store.flush();

    let stats = store.batch_stats();
    info!("Committed {} write batches", stats.batches);

    info!("Server stopped. Goodbye!");
    Ok(())
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
