//! Sidecar Configuration
//!
//! Bind address, scan row ceiling, replica location, log level and the
//! connection deadlines. Loaded from JSON; every field has a default.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::StartupError;
use crate::observability::Severity;

/// Sidecar configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarConfig {
    /// Address to listen on (default: "127.0.0.1:1331")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum rows a prefix scan may return; 0 means unbounded
    #[serde(default)]
    pub max_rows: usize,

    /// Snapshot file of the local replica (default: "./replica.json")
    #[serde(default = "default_replica_path")]
    pub replica_path: PathBuf,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deadline for reading a request body, in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Deadline for producing a response, in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub write_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:1331".to_string()
}

fn default_replica_path() -> PathBuf {
    PathBuf::from("./replica.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_rows: 0,
            replica_path: default_replica_path(),
            log_level: default_log_level(),
            read_timeout_secs: default_timeout_secs(),
            write_timeout_secs: default_timeout_secs(),
        }
    }
}

impl SidecarConfig {
    /// Default config listening on `bind_addr`
    pub fn with_bind_addr(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Default::default()
        }
    }

    /// Set the scan row ceiling
    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Result<Severity, StartupError> {
        self.log_level
            .parse()
            .map_err(|e: crate::observability::UnknownSeverity| {
                StartupError::InvalidConfig(e.to_string())
            })
    }

    /// Reject configs the sidecar cannot start with
    pub fn validate(&self) -> Result<(), StartupError> {
        let port = self
            .bind_addr
            .rsplit_once(':')
            .filter(|(host, _)| !host.is_empty())
            .and_then(|(_, port)| port.parse::<u16>().ok());
        if port.is_none() {
            return Err(StartupError::InvalidConfig(format!(
                "bind_addr '{}' must be host:port",
                self.bind_addr
            )));
        }

        self.severity()?;

        if self.read_timeout_secs == 0 || self.write_timeout_secs == 0 {
            return Err(StartupError::InvalidConfig(
                "read_timeout_secs and write_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
