// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # GradeChain Node
//!
//! Entry point for the `gradechain-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the chain file and serves the
//! REST API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the HTTP node
//! - `verify`  — check a chain file offline and exit non-zero if it is invalid
//! - `version` — print build version information

mod api;
mod cache;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;

use gradechain_ledger::{validate_chain, Block, ChainStore, JsonFileStore};

use cli::{Commands, GradeChainCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = GradeChainCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await.map(|()| ExitCode::SUCCESS),
        Commands::Verify(args) => verify_chain(args),
        Commands::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Starts the node: opens the ledger, then serves the API and metrics
/// endpoints until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format());

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        chain_file = %args.chain_file.display(),
        cache = args.cache,
        "starting gradechain-node"
    );

    // --- Ledger ---
    // Opening may touch the filesystem; keep it off the async workers.
    let chain_file = args.chain_file.clone();
    let chain = tokio::task::spawn_blocking(move || ChainStore::open(JsonFileStore::new(chain_file)))
        .await
        .context("ledger initialization task failed")?;
    let chain = Arc::new(chain);
    if let Err(fault) = chain.validate() {
        tracing::warn!(%fault, "loaded chain fails verification, serving it anyway");
    }

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.chain_length.set(chain.len() as i64);

    // --- Application state ---
    let app_state = api::AppState {
        chain: Arc::clone(&chain),
        cache: args.cache.then(|| Arc::new(cache::ResponseCache::new())),
        metrics: Arc::clone(&node_metrics),
        request_timeout: args.request_timeout(),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = metrics::metrics_router(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    // In-flight requests finish before the API server returns, so any
    // append that was accepted is also persisted.
    tokio::select! {
        res = axum::serve(api_listener, api_router).with_graceful_shutdown(shutdown_signal()) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
            tracing::info!("shutdown signal received, connections drained");
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
    }

    tracing::info!(blocks = chain.len(), "gradechain-node stopped");
    Ok(())
}

/// Checks a chain file offline. The file is never modified.
fn verify_chain(args: cli::VerifyArgs) -> Result<ExitCode> {
    logging::init_logging("gradechain_node=warn,gradechain_ledger=warn", LogFormat::Pretty);

    let store = JsonFileStore::new(&args.chain_file);
    let records = store
        .read_records()
        .with_context(|| format!("failed to read chain file {}", args.chain_file.display()))?;
    let blocks: Vec<Block> = records.into_iter().map(Block::from_record).collect();

    println!("Chain file : {}", args.chain_file.display());
    println!("Blocks     : {}", blocks.len());
    match validate_chain(&blocks) {
        Ok(()) => {
            println!("Status     : valid");
            Ok(ExitCode::SUCCESS)
        }
        Err(fault) => {
            println!("Status     : INVALID ({})", fault);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("gradechain-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that branch never completes.
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
