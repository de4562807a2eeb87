// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AssetVault Node
//!
//! Entry point for the `assetvault-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the registry database, drives the
//! logical clock, and serves the REST API.
//!
//! The binary supports three subcommands:
//!
//! - `run`: start the node
//! - `init`: create the data directory and a default `config.json`
//! - `version`: print build version information

mod api;
mod cli;
mod clock;
mod config;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use assetvault_registry::{Clock, Registry, SledStore};

use cli::{AssetVaultCli, Commands};
use config::{NodeConfig, CONFIG_FILE_NAME};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AssetVaultCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: clock task, API server, and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::RUN_DIRECTIVES, args.log_format);

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            args.data_dir.display()
        )
    })?;

    // --- Configuration ---
    let mut node_config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::load_or_default(&args.data_dir.join(CONFIG_FILE_NAME))?,
    };
    if let Some(port) = args.api_port {
        node_config.api_port = port;
    }
    if let Some(port) = args.metrics_port {
        node_config.metrics_port = port;
    }

    tracing::info!(
        api_port = node_config.api_port,
        metrics_port = node_config.metrics_port,
        tick_interval_ms = node_config.tick_interval_ms,
        data_dir = %args.data_dir.display(),
        "starting assetvault-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    let store = SledStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Logical clock ---
    // Resumes above the last persisted value when wall time lags behind it.
    let wall = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
    let clock = clock::resume(&store, wall).context("failed to restore logical clock")?;
    let clock = Arc::new(clock);
    let start = clock.now();
    tracing::info!(start, wall, "logical clock restored");

    let clock_store = store.clone();
    let registry = Arc::new(Mutex::new(Registry::with_config(
        store,
        node_config.registry.clone(),
    )));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics
        .clock_height
        .set(i64::try_from(start).unwrap_or(i64::MAX));

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        registry: Arc::clone(&registry),
        clock: Arc::clone(&clock),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", node_config.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", node_config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Clock task ---
    let clock_ref = Arc::clone(&clock);
    let metrics_ref = Arc::clone(&node_metrics);
    let tick = Duration::from_millis(node_config.tick_interval_ms);
    let clock_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            match clock::tick(&clock_ref, &clock_store) {
                Ok(height) => {
                    metrics_ref
                        .clock_height
                        .set(i64::try_from(height).unwrap_or(i64::MAX));
                    tracing::trace!(height, "clock advanced");
                }
                Err(e) => tracing::error!("failed to persist clock height: {}", e),
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    clock_loop.abort();
    if let Err(e) = registry.lock().store().flush() {
        tracing::error!("failed to flush database: {}", e);
    }
    tracing::info!("assetvault-node stopped");
    Ok(())
}

/// Creates the data directory and writes a default configuration file.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(logging::INIT_DIRECTIVES, LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            config_path.display()
        );
    }

    let node_config = NodeConfig::default();
    node_config.save(&config_path)?;
    tracing::info!(path = %config_path.display(), "configuration written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config file    : {}", config_path.display());
    println!("  API port       : {}", node_config.api_port);
    println!("  Metrics port   : {}", node_config.metrics_port);

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("assetvault-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
