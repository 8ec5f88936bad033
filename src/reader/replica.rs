//! File-backed reader over the local replica
//!
//! The replication process keeps a JSON snapshot of the replica on disk.
//! Every call re-reads it, so updates are picked up without a restart and a
//! dropped request future abandons the read.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use super::cursor::RowCursor;
use super::errors::{ReaderError, ReaderResult};
use super::snapshot::ReplicaSnapshot;
use super::{KeyArg, Reader, Row};
use crate::observability::Logger;

/// [`Reader`] serving the replica snapshot file at `path`
#[derive(Debug, Clone)]
pub struct ReplicaReader {
    path: PathBuf,
}

impl ReplicaReader {
    /// Open the replica, verifying the snapshot is readable and well-formed.
    pub async fn open(path: impl Into<PathBuf>) -> ReaderResult<Self> {
        let reader = Self { path: path.into() };
        reader.load().await?;

        let path = reader.path.display().to_string();
        Logger::info("REPLICA_OPEN", &[("path", path.as_str())]);
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ReaderResult<ReplicaSnapshot> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ReaderError::unavailable(format!(
                    "replica not found at {}",
                    self.path.display()
                ))
            } else {
                ReaderError::Io(format!("{}: {}", self.path.display(), e))
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|e| ReaderError::Corrupt(e.to_string()))
    }
}

impl Reader for ReplicaReader {
    async fn get_row_by_key(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> ReaderResult<Option<Row>> {
        let snapshot = self.load().await?;
        snapshot.table(family, table)?.lookup(key)
    }

    async fn get_rows_by_key_prefix(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> ReaderResult<RowCursor> {
        let snapshot = self.load().await?;
        let rows = snapshot.table(family, table)?.scan_prefix(key)?;
        Ok(RowCursor::from_rows(rows))
    }

    async fn get_ledger_latency(&self) -> ReaderResult<Duration> {
        let snapshot = self.load().await?;
        snapshot.ledger_latency(Utc::now())
    }
}
