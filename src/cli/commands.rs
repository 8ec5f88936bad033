//! CLI command implementations
//!
//! `serve` opens the replica and serves HTTP until Ctrl-C. `check` opens the
//! replica, reports its ledger latency once and exits.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::http_server::{Sidecar, SidecarConfig};
use crate::observability::Logger;
use crate::reader::{Reader, ReplicaReader};

use super::args::{Command, Overrides};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Load a config file, or the defaults when no path is given
pub fn load_config(path: Option<&Path>) -> CliResult<SidecarConfig> {
    let Some(path) = path else {
        return Ok(SidecarConfig::default());
    };

    let content = fs::read_to_string(path)
        .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

    serde_json::from_str(&content)
        .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))
}

/// Load the config named by `overrides`, apply the flag overrides on top and
/// validate the result
pub fn resolve_config(overrides: &Overrides) -> CliResult<SidecarConfig> {
    let mut config = load_config(overrides.config.as_deref())?;

    if let Some(bind_addr) = &overrides.bind_addr {
        config.bind_addr = bind_addr.clone();
    }
    if let Some(max_rows) = overrides.max_rows {
        config.max_rows = max_rows;
    }
    if let Some(replica) = &overrides.replica {
        config.replica_path = replica.clone();
    }
    if let Some(log_level) = &overrides.log_level {
        config.log_level = log_level.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve(overrides) => serve(resolve_config(&overrides)?),
        Command::Check(overrides) => check(resolve_config(&overrides)?),
    }
}

/// Serve the sidecar until interrupted
pub fn serve(config: SidecarConfig) -> CliResult<()> {
    Logger::set_min_severity(config.severity()?);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::serve_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let reader = ReplicaReader::open(config.replica_path.clone()).await?;
        Sidecar::new(config, reader).start().await?;
        Ok::<(), CliError>(())
    })
}

/// Report the replica's ledger latency once
pub fn check(config: SidecarConfig) -> CliResult<()> {
    Logger::set_min_severity(config.severity()?);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;

    let latency = rt.block_on(async {
        let reader = ReplicaReader::open(config.replica_path.clone()).await?;
        reader.get_ledger_latency().await
    })?;

    write_response(&json!({
        "ok": true,
        "ledger_latency_seconds": latency.as_secs_f64(),
    }))
}
