//! # Sidecar HTTP Server
//!
//! Serves the read-only control-store API over HTTP with JSON bodies.
//!
//! # Endpoints
//!
//! - `POST /get-row-by-key/{family}/{table}` - point lookup
//! - `POST /get-rows-by-key-prefix/{family}/{table}` - prefix scan
//! - `GET /get-ledger-latency` - replication lag in seconds
//! - `GET /healthcheck` - 200 while the replica answers
//! - `GET /ping` - same as `/healthcheck`

pub mod config;
pub mod errors;
pub mod key;
pub mod server;
pub mod sidecar_routes;

pub use config::SidecarConfig;
pub use errors::{finalize, SidecarError, SidecarResult, StartupError};
pub use key::{to_positional_args, KeySegment, ReadRequest};
pub use server::Sidecar;
pub use sidecar_routes::{NOT_FOUND_HEADER, NOT_FOUND_VALUE};
