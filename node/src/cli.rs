//! # CLI Interface
//!
//! Defines the command-line argument structure for `piggybank-node` using
//! `clap` derive. Supports three subcommands: `run`, `predict`, and
//! `version`.

use clap::{Args, Parser, Subcommand};
use piggybank_protocol::config::{
    DEFAULT_FACTORY_LABEL, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT, NETWORK_DEVNET,
};

/// PiggyBank vault factory node.
///
/// Serves the vault factory over HTTP and WebSocket, backed by an in-memory
/// asset ledger, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "piggybank-node",
    about = "PiggyBank vault factory node",
    version,
    propagate_version = true
)]
pub struct PiggyBankCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Compute the address a vault would get, without creating it.
    Predict(PredictArgs),
    /// Print version information and exit.
    Version,
}

/// Which factory deployment to address.
#[derive(Args, Debug, Clone)]
pub struct FactoryArgs {
    /// Network name: mainnet, testnet, or devnet.
    #[arg(long, env = "PIGGYBANK_NETWORK", default_value = NETWORK_DEVNET)]
    pub network: String,

    /// Deployment label. Together with the network it fixes the factory id.
    #[arg(long, env = "PIGGYBANK_FACTORY_LABEL", default_value = DEFAULT_FACTORY_LABEL)]
    pub factory_label: String,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub factory: FactoryArgs,

    /// Port for the REST and WebSocket API.
    #[arg(long, env = "PIGGYBANK_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "PIGGYBANK_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "PIGGYBANK_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `predict` subcommand.
#[derive(Parser, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub factory: FactoryArgs,

    /// Account that would create the vault.
    #[arg(long)]
    pub creator: String,

    /// Allowed asset ids, comma separated, in order.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub assets: Vec<String>,

    /// Lock duration in seconds.
    #[arg(long, allow_hyphen_values = true)]
    pub lock_duration_secs: i64,

    /// Free-form vault label.
    #[arg(long, default_value = "")]
    pub purpose: String,

    /// Hex-encoded 32-byte salt. Derived from creator and purpose if omitted.
    #[arg(long)]
    pub salt: Option<String>,
}
