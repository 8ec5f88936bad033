//! CLI module for ctlstore-sidecar
//!
//! Provides command-line interface for:
//! - serve: Open the replica and serve HTTP until interrupted
//! - check: Print the replica's ledger latency once

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, Overrides};
pub use commands::{check, load_config, resolve_config, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_response};
