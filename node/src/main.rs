// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # TwinVault Devnet Node
//!
//! Entry point for the `twinvault-node` binary. Parses CLI arguments,
//! initializes logging and metrics, builds the devnet chain with a deployed
//! vault, and serves the HTTP/WS API.
//!
//! Subcommands:
//!
//! - `run`: start the node
//! - `genesis`: write the default devnet genesis as JSON
//! - `version`: print build version information

mod api;
mod cli;
mod devnet;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use twinvault_protocol::config::{network_name, PROTOCOL_VERSION};
use twinvault_protocol::genesis::Genesis;

use cli::{Commands, TwinVaultCli};
use devnet::Devnet;
use logging::LogFormat;
use metrics::VaultMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TwinVaultCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Genesis(args) => write_genesis(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: builds the devnet, then serves the API and metrics
/// endpoints until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, LogFormat::from_str_lossy(&args.log_format))
        .context("failed to initialize logging")?;

    let genesis = match &args.genesis {
        Some(path) => Genesis::load(path)
            .with_context(|| format!("failed to load genesis from {}", path.display()))?,
        None => Genesis::devnet(),
    };

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        chain_id = genesis.chain_id,
        "starting twinvault-node"
    );

    // --- Metrics ---
    let vault_metrics = Arc::new(VaultMetrics::new().context("failed to register metrics")?);

    // --- Devnet ---
    let devnet = Arc::new(
        Devnet::from_genesis(&genesis, Arc::clone(&vault_metrics))
            .context("failed to build devnet from genesis")?,
    );
    for token in devnet.tokens() {
        tracing::info!(symbol = %token.symbol, address = %token.address, "token deployed");
    }

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        network: network_name(devnet.chain_id()),
        devnet,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&vault_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

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

    tracing::info!("twinvault-node stopped");
    Ok(())
}

/// Writes the built-in devnet genesis to `--output`, or stdout.
fn write_genesis(args: cli::GenesisArgs) -> Result<()> {
    let genesis = Genesis::devnet();
    let json = serde_json::to_string_pretty(&genesis).context("failed to encode genesis")?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write genesis to {}", path.display()))?;
            eprintln!("genesis written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("twinvault-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that branch never fires and the node
/// keeps running until the other one does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
