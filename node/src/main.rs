// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PiggyBank Node
//!
//! Entry point for the `piggybank-node` binary. Parses CLI arguments,
//! initializes logging and metrics, builds the vault factory and serves the
//! HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     start the node
//! - `predict` compute a vault address offline
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use piggybank_contracts::validation::{lock_duration_from_signed, validate_creation};
use piggybank_protocol::config::{is_known_network, network_name};
use piggybank_protocol::{AccountId, AssetId, FactoryId, IdentifierDeriver, Salt, SystemClock};

use cli::{Commands, PiggyBankCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PiggyBankCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Predict(args) => predict(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "piggybank_node=info,piggybank_contracts=info,piggybank_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let network = &args.factory.network;
    anyhow::ensure!(
        is_known_network(network),
        "unknown network {:?}, expected mainnet, testnet or devnet",
        network
    );

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::build_state(
        network,
        &args.factory.factory_label,
        Arc::new(SystemClock),
        Arc::clone(&node_metrics),
        event_tx,
    );

    tracing::info!(
        network = %network_name(network),
        factory_label = %args.factory.factory_label,
        factory_id = %app_state.factory.factory_id(),
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        faucet = app_state.faucet_enabled,
        "starting piggybank-node"
    );

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
        .with_state(Arc::clone(&node_metrics));
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

    tracing::info!("piggybank-node stopped");
    Ok(())
}

/// Prints the address and salt a creation request would get, as JSON.
/// Applies the same rules as the factory but needs no running node.
fn predict(args: cli::PredictArgs) -> Result<()> {
    anyhow::ensure!(
        is_known_network(&args.factory.network),
        "unknown network {:?}",
        args.factory.network
    );

    let creator = AccountId::new(args.creator);
    let assets: Vec<AssetId> = args.assets.into_iter().map(AssetId::new).collect();
    let lock_secs = lock_duration_from_signed(args.lock_duration_secs)?;
    let params = validate_creation(&assets, lock_secs, &args.purpose)?;

    let salt = match args.salt {
        Some(hex) => hex
            .parse::<Salt>()
            .with_context(|| format!("invalid salt {}", hex))?,
        None => IdentifierDeriver::derive_salt(&creator, &args.purpose),
    };

    let factory_id = FactoryId::derive(&args.factory.network, &args.factory.factory_label);
    let identifier = IdentifierDeriver::new(factory_id).derive_identifier(
        &creator,
        &params.allowed_assets,
        lock_secs,
        &args.purpose,
        &salt,
    );

    let out = serde_json::json!({
        "network": args.factory.network,
        "factory_id": factory_id,
        "identifier": identifier,
        "salt": salt,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("failed to render prediction")?
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("piggybank-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", piggybank_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
