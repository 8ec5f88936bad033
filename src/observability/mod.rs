//! Observability for the sidecar
//!
//! - Structured logging (JSON, one line per event)
//! - Per-operation API latency counters
//! - Drop-based latency scopes around every handler
//!
//! Observability is a pure side effect: nothing here can fail a request.

mod logger;
mod metrics;
mod scope;

pub use logger::{Logger, Severity, UnknownSeverity};
pub use metrics::{ApiMetrics, ApiOperation, LatencyRecorder, LatencySnapshot, NoOpLatency};
pub use scope::LatencyObservation;

#[cfg(test)]
pub(crate) use logger::capture_logs;
