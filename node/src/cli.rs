//! # CLI Interface
//!
//! Defines the command-line argument structure for `gradechain-node` using
//! `clap` derive. Every `run` setting can also come from the environment;
//! all of them are fixed for the lifetime of the process.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use gradechain_ledger::config::DEFAULT_CHAIN_FILE;

use crate::logging::LogFormat;

/// GradeChain node.
///
/// Serves a tamper-evident ledger of student grades over HTTP. Every
/// recorded mark is a block linked to the one before it by hash.
#[derive(Parser, Debug)]
#[command(
    name = "gradechain-node",
    about = "GradeChain student grade ledger node",
    version,
    propagate_version = true
)]
pub struct GradeChainCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the GradeChain node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP node.
    Run(RunArgs),
    /// Check a chain file's integrity without modifying it.
    Verify(VerifyArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the chain file. Created with a genesis block if absent.
    #[arg(long, env = "CHAIN_FILE", default_value = DEFAULT_CHAIN_FILE)]
    pub chain_file: PathBuf,

    /// Address to bind the API and metrics listeners to.
    #[arg(long, env = "GRADECHAIN_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the REST API.
    #[arg(long, short = 'p', env = "GRADECHAIN_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "GRADECHAIN_METRICS_PORT", default_value_t = 5001)]
    pub metrics_port: u16,

    /// Cache `/chain` and `/student/{id}` responses in memory.
    #[arg(long, env = "USE_CACHE", default_value_t = false)]
    pub cache: bool,

    /// Upper bound, in milliseconds, on a single ledger operation.
    #[arg(long, env = "GRADECHAIN_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "GRADECHAIN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RunArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Path to the chain file to check.
    #[arg(long, env = "CHAIN_FILE", default_value = DEFAULT_CHAIN_FILE)]
    pub chain_file: PathBuf,
}
