//! ctlstore-sidecar - a read-only HTTP front for a replicated control-store
//!
//! The sidecar answers point lookups and prefix scans against the local
//! replica and reports replication lag, so callers can read the store without
//! linking its native client.

pub mod cli;
pub mod http_server;
pub mod observability;
pub mod reader;

pub use http_server::{Sidecar, SidecarConfig, SidecarError};
pub use reader::{KeyArg, Reader, ReaderError, Row, RowCursor};
