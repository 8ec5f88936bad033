//! # Reader capability
//!
//! The sidecar never talks to the control-store directly. It is handed a
//! [`Reader`] that can look up one row by full primary key, scan rows by a
//! key prefix, and report how far the local replica lags the ledger.
//!
//! Two readers ship with the crate:
//!
//! - [`ReplicaReader`] serves the JSON snapshot of the local replica on disk
//! - [`MemoryReader`] is an in-memory fake with fault injection for tests

mod cursor;
mod errors;
mod memory;
mod replica;
mod snapshot;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

pub use cursor::RowCursor;
pub use errors::{ReaderError, ReaderResult};
pub use memory::MemoryReader;
pub use replica::ReplicaReader;
pub use snapshot::{ReplicaSnapshot, TableData};

/// One store record: column name to value
pub type Row = serde_json::Map<String, Value>;

/// A resolved primary-key segment, in the form the reader consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyArg {
    /// A JSON scalar (number, string, bool or null)
    Value(Value),
    /// Raw bytes for varbinary key columns
    Bytes(Vec<u8>),
}

impl KeyArg {
    /// Whether a stored column value equals this key segment.
    ///
    /// Numbers compare numerically. Bytes match a string column with the same
    /// UTF-8 bytes or an array of byte values.
    pub fn matches(&self, column: &Value) -> bool {
        match self {
            KeyArg::Value(value) => snapshot::values_equal(value, column),
            KeyArg::Bytes(bytes) => match column {
                Value::String(s) => s.as_bytes() == bytes.as_slice(),
                Value::Array(items) => {
                    items.len() == bytes.len()
                        && items
                            .iter()
                            .zip(bytes)
                            .all(|(item, b)| item.as_u64() == Some(u64::from(*b)))
                }
                _ => false,
            },
        }
    }
}

/// Read access to the replicated control-store.
///
/// Implementations are shared by every in-flight request and must be safe
/// to call concurrently. Dropping a returned future abandons the call, which
/// is how a client disconnect cancels store work.
pub trait Reader: Send + Sync + 'static {
    /// Look up the row whose primary key equals `key`.
    ///
    /// `Ok(None)` means the lookup ran and nothing matched.
    fn get_row_by_key(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> impl Future<Output = ReaderResult<Option<Row>>> + Send;

    /// Open a cursor over every row whose leading key columns equal `key`.
    fn get_rows_by_key_prefix(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> impl Future<Output = ReaderResult<RowCursor>> + Send;

    /// How far the local replica lags behind the ledger.
    fn get_ledger_latency(&self) -> impl Future<Output = ReaderResult<Duration>> + Send;
}

impl<R: Reader> Reader for Arc<R> {
    fn get_row_by_key(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> impl Future<Output = ReaderResult<Option<Row>>> + Send {
        (**self).get_row_by_key(family, table, key)
    }

    fn get_rows_by_key_prefix(
        &self,
        family: &str,
        table: &str,
        key: &[KeyArg],
    ) -> impl Future<Output = ReaderResult<RowCursor>> + Send {
        (**self).get_rows_by_key_prefix(family, table, key)
    }

    fn get_ledger_latency(&self) -> impl Future<Output = ReaderResult<Duration>> + Send {
        (**self).get_ledger_latency()
    }
}
