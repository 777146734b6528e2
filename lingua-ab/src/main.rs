//! Read-along service (lingua-ab) - Main entry point
//!
//! Serves chapter alignments, highlight snapshots and reading progress
//! over HTTP, backed by a SQLite database under the root folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lingua_ab::config::Config;
use lingua_ab::db::settings::load_sync_settings;
use lingua_ab::{api, AppState};
use lingua_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "lingua_ab=debug,tower_http=debug";

/// Command-line arguments for lingua-ab
#[derive(Parser, Debug)]
#[command(name = "lingua-ab")]
#[command(about = "Audiobook read-along synchronization service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "LINGUA_AB_PORT")]
    port: Option<u16>,

    /// Root folder holding the service database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (skips the platform search)
    #[arg(short, long, env = "LINGUA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new("lingua-ab")
        .with_cli_arg(args.root_folder.clone())
        .with_config_file(args.config.clone());
    let toml_config = resolver.toml_config().unwrap_or_default();

    // RUST_LOG wins over the config file
    let default_filter = toml_config
        .log_level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "lingua-ab {} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolver.resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let config = Config {
        root_folder: initializer.root_folder().to_path_buf(),
        db_path: initializer.database_path(),
        port: args
            .port
            .or(toml_config.port)
            .unwrap_or_else(|| CompiledDefaults::for_current_platform().port),
    };
    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.db_path.display());

    let pool = lingua_common::db::init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;

    let settings = match load_sync_settings(&pool).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Invalid read-along settings, using defaults: {}", e);
            Default::default()
        }
    };
    info!(
        persist_window_secs = settings.persist.window.as_secs(),
        loss_threshold = settings.render.structural.loss_threshold,
        cache_capacity = settings.alignment_cache_capacity,
        "Loaded read-along settings"
    );

    let state = AppState::new(pool, settings);
    api::run(&config, state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
