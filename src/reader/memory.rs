//! In-memory reader with fault injection
//!
//! Serves a [`ReplicaSnapshot`] held in memory and lets callers script the
//! failures a real store produces: unreachable replica, failed lookups or
//! scans, and scans that break after some number of rows. Every call and
//! every cursor release is counted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use super::cursor::RowCursor;
use super::errors::{ReaderError, ReaderResult};
use super::snapshot::ReplicaSnapshot;
use super::{KeyArg, Reader, Row};

/// Deterministic in-memory [`Reader`]
#[derive(Debug)]
pub struct MemoryReader {
    snapshot: ReplicaSnapshot,
    ledger_latency: Result<Duration, String>,
    lookup_failure: Option<String>,
    scan_failure: Option<String>,
    scan_failure_after: Option<(usize, String)>,
    delay: Duration,

    lookups: AtomicUsize,
    scans: AtomicUsize,
    latency_queries: AtomicUsize,
    rows_fetched: Arc<AtomicUsize>,
    cursors_released: Arc<AtomicUsize>,
    last_key: Mutex<Option<Vec<KeyArg>>>,
}

impl Default for MemoryReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReader {
    /// An empty store with zero replication lag
    pub fn new() -> Self {
        Self::with_snapshot(ReplicaSnapshot::new())
    }

    pub fn with_snapshot(snapshot: ReplicaSnapshot) -> Self {
        Self {
            snapshot,
            ledger_latency: Ok(Duration::ZERO),
            lookup_failure: None,
            scan_failure: None,
            scan_failure_after: None,
            delay: Duration::ZERO,
            lookups: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
            latency_queries: AtomicUsize::new(0),
            rows_fetched: Arc::new(AtomicUsize::new(0)),
            cursors_released: Arc::new(AtomicUsize::new(0)),
            last_key: Mutex::new(None),
        }
    }

    /// Add a row.
    ///
    /// # Panics
    ///
    /// If `row` is not a JSON object.
    pub fn with_row(mut self, family: &str, table: &str, key_columns: &[&str], row: Value) -> Self {
        match row {
            Value::Object(row) => self.snapshot.insert_row(family, table, key_columns, row),
            other => panic!("row for {}___{} must be a JSON object, got {}", family, table, other),
        }
        self
    }

    /// Create an empty table
    pub fn with_table(mut self, family: &str, table: &str, key_columns: &[&str]) -> Self {
        self.snapshot.create_table(family, table, key_columns);
        self
    }

    pub fn with_ledger_latency(mut self, latency: Duration) -> Self {
        self.ledger_latency = Ok(latency);
        self
    }

    /// Make every latency query fail with `message`
    pub fn with_latency_failure(mut self, message: impl Into<String>) -> Self {
        self.ledger_latency = Err(message.into());
        self
    }

    pub fn with_lookup_failure(mut self, message: impl Into<String>) -> Self {
        self.lookup_failure = Some(message.into());
        self
    }

    /// Make opening a scan fail with `message`
    pub fn with_scan_failure(mut self, message: impl Into<String>) -> Self {
        self.scan_failure = Some(message.into());
        self
    }

    /// Make scans yield `rows` rows, then an error with `message`
    pub fn with_scan_failure_after(mut self, rows: usize, message: impl Into<String>) -> Self {
        self.scan_failure_after = Some((rows, message.into()));
        self
    }

    /// Make every call wait `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Point lookups issued so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Prefix scans issued so far
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Ledger latency queries issued so far
    pub fn latency_queries(&self) -> usize {
        self.latency_queries.load(Ordering::SeqCst)
    }

    /// Calls of any kind
    pub fn calls(&self) -> usize {
        self.lookups() + self.scans() + self.latency_queries()
    }

    /// Rows pulled out of scan cursors so far
    pub fn rows_fetched(&self) -> usize {
        self.rows_fetched.load(Ordering::SeqCst)
    }

    /// Scan cursors released so far
    pub fn cursors_released(&self) -> usize {
        self.cursors_released.load(Ordering::SeqCst)
    }

    /// Key arguments of the most recent lookup or scan
    pub fn last_key(&self) -> Option<Vec<KeyArg>> {
        self.last_key
            .lock()
            .map(|key| key.clone())
            .unwrap_or_default()
    }

    async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn remember_key(&self, key: &[KeyArg]) {
        if let Ok(mut last) = self.last_key.lock() {
            *last = Some(key.to_vec());
        }
    }

    fn open_cursor(&self, rows: Vec<Row>) -> RowCursor {
        let mut items: Vec<ReaderResult<Row>> = rows.into_iter().map(Ok).collect();
        if let Some((after, message)) = &self.scan_failure_after {
            items.truncate(*after);
            items.push(Err(ReaderError::unavailable(message.clone())));
        }

        let fetched = self.rows_fetched.clone();
        let released = self.cursors_released.clone();
        RowCursor::new(items.into_iter().inspect(move |item| {
            if item.is_ok() {
                fetched.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .on_release(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

impl Reader for MemoryReader {
    async fn get_row_by_key(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> ReaderResult<Option<Row>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.remember_key(key);
        if let Some(message) = &self.lookup_failure {
            return Err(ReaderError::unavailable(message.clone()));
        }
        self.snapshot.table(family, table)?.lookup(key)
    }

    async fn get_rows_by_key_prefix(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> ReaderResult<RowCursor> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.remember_key(key);
        if let Some(message) = &self.scan_failure {
            return Err(ReaderError::unavailable(message.clone()));
        }
        let rows = self.snapshot.table(family, table)?.scan_prefix(key)?;
        Ok(self.open_cursor(rows))
    }

    async fn get_ledger_latency(&self) -> ReaderResult<Duration> {
        self.latency_queries.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.ledger_latency
            .clone()
            .map_err(ReaderError::Unavailable)
    }
}
