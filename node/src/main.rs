// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SWAN Relay Node
//!
//! Entry point for the `swan-node` binary. Parses CLI arguments, resolves
//! settings, initializes logging and metrics, and serves the SWAN API.
//!
//! Subcommands:
//!
//! - `run`: start the relay
//! - `keygen`: print a fresh creator key and SID secret for a settings file
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tokio::signal;

use swan::owid::Creator;
use swan::swift::{HttpGet, ReqwestTransport};

use cli::{Commands, SwanNodeCli};
use logging::LogFormat;
use metrics::{MeteredTransport, SwanMetrics};
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SwanNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the API server and the metrics endpoint and runs until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let settings = Settings::from_args(&args)?;
    tracing::info!(
        port = settings.port,
        metrics_port = settings.metrics_port,
        network = %settings.swan.network,
        scheme = %settings.swan.scheme,
        access_node = settings.access_node.as_deref().unwrap_or("<none>"),
        sid_algorithm = settings.sid.name(),
        debug = settings.swan.debug,
        "starting swan-node"
    );

    // --- Metrics ---
    let node_metrics = Arc::new(SwanMetrics::new().context("failed to create metrics registry")?);

    // --- Outbound transport ---
    let reqwest = ReqwestTransport::new(settings.request_timeout)
        .context("failed to build the access node client")?;
    let transport: Arc<dyn HttpGet> = Arc::new(MeteredTransport::new(
        Arc::new(reqwest),
        Arc::clone(&node_metrics),
    ));

    // --- Application state ---
    let app_state = api::AppState::from_settings(&settings, transport, Arc::clone(&node_metrics))?;

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", settings.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("SWAN API listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", settings.metrics_port);
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

    tracing::info!("swan-node stopped");
    Ok(())
}

/// Prints a settings-file fragment with a fresh creator and SID secret.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let mut creator_secret = [0u8; 32];
    let mut sid_secret = [0u8; 32];
    OsRng.fill_bytes(&mut creator_secret);
    OsRng.fill_bytes(&mut sid_secret);

    let creator = Creator::from_secret(&args.domain, &args.name, &creator_secret);
    let fragment = serde_json::json!({
        "sidAlgorithm": "blake3-keyed",
        "sidSecret": hex::encode(sid_secret),
        "creators": [{
            "domain": creator.domain(),
            "name": creator.name(),
            "secretKeyHex": hex::encode(creator_secret),
        }],
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&fragment).context("failed to render settings fragment")?
    );
    eprintln!(
        "public key for {}: {}",
        creator.domain(),
        hex::encode(creator.public_key().as_bytes())
    );
    Ok(())
}

fn print_version() {
    println!("swan-node {}", env!("CARGO_PKG_VERSION"));
    println!("owid      v{}", swan::owid::OWID_VERSION);
    println!("results   v{}", swan::swift::results::RESULTS_VERSION);
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
