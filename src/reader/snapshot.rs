//! In-memory model of the local replica
//!
//! A snapshot holds every family/table with its primary-key columns and
//! rows, plus the timestamp of the last ledger entry applied to it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ReaderError, ReaderResult};
use super::{KeyArg, Row};

/// Contents of the local replica
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    /// When the last ledger entry was applied
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,

    /// family -> table -> data
    #[serde(default)]
    pub families: BTreeMap<String, BTreeMap<String, TableData>>,
}

/// One replicated table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableData {
    /// Primary-key columns, in key order
    pub key_columns: Vec<String>,

    #[serde(default)]
    pub rows: Vec<Row>,
}

impl ReplicaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a table, failing with `TableNotFound`
    pub fn table(&self, family: &str, table: &str) -> ReaderResult<&TableData> {
        self.families
            .get(family)
            .and_then(|tables| tables.get(table))
            .ok_or_else(|| ReaderError::table_not_found(family, table))
    }

    /// Get a table, creating it empty with `key_columns` if needed
    pub fn create_table(&mut self, family: &str, table: &str, key_columns: &[&str]) -> &mut TableData {
        self.families
            .entry(family.to_string())
            .or_default()
            .entry(table.to_string())
            .or_insert_with(|| TableData {
                key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            })
    }

    /// Add a row, creating the table with `key_columns` if needed
    pub fn insert_row(&mut self, family: &str, table: &str, key_columns: &[&str], row: Row) {
        self.create_table(family, table, key_columns).rows.push(row);
    }

    /// Replication lag as of `now`. Clock skew never yields a negative lag.
    pub fn ledger_latency(&self, now: DateTime<Utc>) -> ReaderResult<Duration> {
        let last_update = self
            .last_update
            .ok_or_else(|| ReaderError::Corrupt("no ledger update recorded".to_string()))?;

        Ok((now - last_update).to_std().unwrap_or(Duration::ZERO))
    }
}

impl TableData {
    fn check_key(&self, key: &[KeyArg], exact: bool) -> ReaderResult<()> {
        let columns = self.key_columns.len();
        if key.len() > columns || (exact && key.len() < columns) {
            return Err(ReaderError::KeyMismatch(format!(
                "key has {} segments but the table has {} key columns",
                key.len(),
                columns
            )));
        }
        Ok(())
    }

    fn key_matches(&self, row: &Row, key: &[KeyArg]) -> bool {
        self.key_columns
            .iter()
            .zip(key)
            .all(|(column, arg)| arg.matches(row.get(column).unwrap_or(&Value::Null)))
    }

    /// The row whose full primary key equals `key`
    pub fn lookup(&self, key: &[KeyArg]) -> ReaderResult<Option<Row>> {
        self.check_key(key, true)?;
        Ok(self
            .rows
            .iter()
            .find(|row| self.key_matches(row, key))
            .cloned())
    }

    /// Rows whose leading key columns equal `key`, in primary-key order
    pub fn scan_prefix(&self, key: &[KeyArg]) -> ReaderResult<Vec<Row>> {
        self.check_key(key, false)?;
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| self.key_matches(row, key))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            self.key_columns
                .iter()
                .map(|column| {
                    compare_values(
                        a.get(column).unwrap_or(&Value::Null),
                        b.get(column).unwrap_or(&Value::Null),
                    )
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(rows)
    }
}

/// JSON equality with numbers compared by value rather than representation
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        _ => a == b,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over key column values: by type first, then by value
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn orders() -> ReplicaSnapshot {
        let mut snapshot = ReplicaSnapshot::new();
        let keys = ["customer", "order_id"];
        snapshot.insert_row("shop", "orders", &keys, row(json!({"customer": "bob", "order_id": 2})));
        snapshot.insert_row("shop", "orders", &keys, row(json!({"customer": "amy", "order_id": 1})));
        snapshot.insert_row("shop", "orders", &keys, row(json!({"customer": "bob", "order_id": 1})));
        snapshot
    }

    #[test]
    fn test_lookup_requires_full_key() {
        let snapshot = orders();
        let table = snapshot.table("shop", "orders").unwrap();

        let err = table.lookup(&[KeyArg::Value(json!("bob"))]).unwrap_err();
        assert!(matches!(err, ReaderError::KeyMismatch(_)));
    }

    #[test]
    fn test_lookup_found_and_missing() {
        let snapshot = orders();
        let table = snapshot.table("shop", "orders").unwrap();

        let found = table
            .lookup(&[KeyArg::Value(json!("bob")), KeyArg::Value(json!(1))])
            .unwrap();
        assert_eq!(found.unwrap()["order_id"], json!(1));

        let missing = table
            .lookup(&[KeyArg::Value(json!("bob")), KeyArg::Value(json!(9))])
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_scan_prefix_orders_by_key() {
        let snapshot = orders();
        let table = snapshot.table("shop", "orders").unwrap();

        let rows = table.scan_prefix(&[KeyArg::Value(json!("bob"))]).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["order_id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);

        let all = table.scan_prefix(&[]).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0]["customer"], json!("amy"));
    }

    #[test]
    fn test_scan_prefix_rejects_overlong_key() {
        let snapshot = orders();
        let table = snapshot.table("shop", "orders").unwrap();
        let key = vec![KeyArg::Value(json!(1)); 3];
        assert!(table.scan_prefix(&key).is_err());
    }

    #[test]
    fn test_unknown_table() {
        let snapshot = orders();
        let err = snapshot.table("shop", "refunds").unwrap_err();
        assert_eq!(err, ReaderError::table_not_found("shop", "refunds"));
    }

    #[test]
    fn test_ledger_latency() {
        let mut snapshot = ReplicaSnapshot::new();
        snapshot.last_update = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 3).unwrap();
        assert_eq!(snapshot.ledger_latency(now).unwrap(), Duration::from_secs(3));

        // replica clock ahead of ours
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 0).unwrap();
        assert_eq!(snapshot.ledger_latency(earlier).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_ledger_latency_without_timestamp() {
        let snapshot = ReplicaSnapshot::new();
        assert!(matches!(
            snapshot.ledger_latency(Utc::now()),
            Err(ReaderError::Corrupt(_))
        ));
    }
}
