//! # CLI Interface
//!
//! Defines the command-line argument structure for `twinvault-node` using
//! `clap` derive. Three subcommands: `run`, `genesis`, and `version`.
//! Every `run` flag can also be set through a `TWINVAULT_*` environment
//! variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use twinvault_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};

/// Default `tracing` directives when neither `--log-level` nor `RUST_LOG`
/// is given.
pub const DEFAULT_LOG_LEVEL: &str =
    "twinvault_node=info,twinvault_contracts=info,twinvault_protocol=info,tower_http=debug";

/// TwinVault devnet node.
///
/// Hosts a TwinVault contract on an in-memory devnet chain, serves the
/// JSON-RPC/REST/WebSocket API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "twinvault-node",
    about = "TwinVault devnet node",
    version,
    propagate_version = true
)]
pub struct TwinVaultCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the devnet node.
    Run(RunArgs),
    /// Write the default devnet genesis as JSON.
    Genesis(GenesisArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to a genesis JSON file.
    ///
    /// When omitted, the built-in devnet genesis is used (alice, bob and
    /// carol funded with native value and the T0/T1 tokens).
    #[arg(long, short = 'g', env = "TWINVAULT_GENESIS")]
    pub genesis: Option<PathBuf>,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "TWINVAULT_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TWINVAULT_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "TWINVAULT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Default `tracing` filter directives. `RUST_LOG` takes precedence.
    #[arg(long, env = "TWINVAULT_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

/// Arguments for the `genesis` subcommand.
#[derive(Parser, Debug)]
pub struct GenesisArgs {
    /// File to write the genesis to. Prints to stdout when omitted.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}
