//! CLI argument definitions using clap
//!
//! Commands:
//! - ctlstore-sidecar serve [--config <path>] [overrides]
//! - ctlstore-sidecar check [--config <path>] [--replica <path>]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ctlstore-sidecar - read-only HTTP access to the local control-store replica
#[derive(Parser, Debug)]
#[command(name = "ctlstore-sidecar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API until interrupted
    Serve(Overrides),

    /// Query the replica's ledger latency once and exit
    Check(Overrides),
}

/// Config file location plus per-field overrides
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Path to a JSON configuration file; defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:1331
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Maximum rows a prefix scan may return (0 = unbounded)
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Snapshot file of the local replica
    #[arg(long)]
    pub replica: Option<PathBuf>,

    /// Minimum log level: trace, info, warn, error or fatal
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
