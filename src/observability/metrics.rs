//! API latency metrics
//!
//! - One counter set per sidecar operation
//! - Monotonic increase, reset only on process start
//! - Lock-free: every counter is an atomic

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::logger::{Logger, Severity};

/// The operations the sidecar serves, used as the `op` tag on latency samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    GetRowByKey,
    GetRowsByKeyPrefix,
    GetLedgerLatency,
    Healthcheck,
    Ping,
}

impl ApiOperation {
    pub const ALL: [ApiOperation; 5] = [
        ApiOperation::GetRowByKey,
        ApiOperation::GetRowsByKeyPrefix,
        ApiOperation::GetLedgerLatency,
        ApiOperation::Healthcheck,
        ApiOperation::Ping,
    ];

    /// Tag value used in logs and snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiOperation::GetRowByKey => "get-row-by-key",
            ApiOperation::GetRowsByKeyPrefix => "get-rows-by-key-prefix",
            ApiOperation::GetLedgerLatency => "get-ledger-latency",
            ApiOperation::Healthcheck => "healthcheck",
            ApiOperation::Ping => "ping",
        }
    }

    fn index(&self) -> usize {
        match self {
            ApiOperation::GetRowByKey => 0,
            ApiOperation::GetRowsByKeyPrefix => 1,
            ApiOperation::GetLedgerLatency => 2,
            ApiOperation::Healthcheck => 3,
            ApiOperation::Ping => 4,
        }
    }
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for per-request latency samples.
///
/// Implementations must never fail or block the request path.
pub trait LatencyRecorder: Send + Sync {
    fn observe(&self, op: ApiOperation, user_agent: &str, elapsed: Duration);
}

/// Recorder that drops every sample
pub struct NoOpLatency;

impl LatencyRecorder for NoOpLatency {
    fn observe(&self, _: ApiOperation, _: &str, _: Duration) {}
}

#[derive(Debug, Default)]
struct OperationCounters {
    observations: AtomicU64,
    total_us: AtomicU64,
    max_us: AtomicU64,
}

/// Default latency recorder: atomic per-operation counters plus a TRACE
/// log line carrying the caller's user-agent.
#[derive(Debug, Default)]
pub struct ApiMetrics {
    operations: [OperationCounters; 5],
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of the counters for one operation
    pub fn snapshot(&self, op: ApiOperation) -> LatencySnapshot {
        let counters = &self.operations[op.index()];
        LatencySnapshot {
            op,
            observations: counters.observations.load(Ordering::Relaxed),
            total_us: counters.total_us.load(Ordering::Relaxed),
            max_us: counters.max_us.load(Ordering::Relaxed),
        }
    }

    /// Snapshots for every operation, in `ApiOperation::ALL` order
    pub fn snapshot_all(&self) -> Vec<LatencySnapshot> {
        ApiOperation::ALL.iter().map(|op| self.snapshot(*op)).collect()
    }
}

impl LatencyRecorder for ApiMetrics {
    fn observe(&self, op: ApiOperation, user_agent: &str, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let counters = &self.operations[op.index()];
        counters.observations.fetch_add(1, Ordering::Relaxed);
        counters.total_us.fetch_add(micros, Ordering::Relaxed);
        counters.max_us.fetch_max(micros, Ordering::Relaxed);

        if Logger::enabled(Severity::Trace) {
            let elapsed_us = micros.to_string();
            Logger::trace(
                "API_LATENCY",
                &[
                    ("op", op.as_str()),
                    ("user_agent", user_agent),
                    ("elapsed_us", elapsed_us.as_str()),
                ],
            );
        }
    }
}

/// Latency counters for one operation at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencySnapshot {
    pub op: ApiOperation,
    pub observations: u64,
    pub total_us: u64,
    pub max_us: u64,
}

impl LatencySnapshot {
    /// Mean latency in microseconds, zero when nothing was observed
    pub fn mean_us(&self) -> u64 {
        if self.observations == 0 {
            0
        } else {
            self.total_us / self.observations
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = ApiMetrics::new();
        for snapshot in metrics.snapshot_all() {
            assert_eq!(snapshot.observations, 0);
            assert_eq!(snapshot.mean_us(), 0);
        }
    }

    #[test]
    fn test_observe_accumulates_per_operation() {
        let metrics = ApiMetrics::new();
        metrics.observe(ApiOperation::Ping, "curl/8.0", Duration::from_micros(100));
        metrics.observe(ApiOperation::Ping, "curl/8.0", Duration::from_micros(300));
        metrics.observe(ApiOperation::Healthcheck, "", Duration::from_micros(50));

        let ping = metrics.snapshot(ApiOperation::Ping);
        assert_eq!(ping.observations, 2);
        assert_eq!(ping.total_us, 400);
        assert_eq!(ping.max_us, 300);
        assert_eq!(ping.mean_us(), 200);

        assert_eq!(metrics.snapshot(ApiOperation::Healthcheck).observations, 1);
        assert_eq!(metrics.snapshot(ApiOperation::GetRowByKey).observations, 0);
    }

    #[test]
    fn test_operation_tags() {
        assert_eq!(ApiOperation::GetRowByKey.as_str(), "get-row-by-key");
        assert_eq!(ApiOperation::GetRowsByKeyPrefix.as_str(), "get-rows-by-key-prefix");
        assert_eq!(ApiOperation::GetLedgerLatency.as_str(), "get-ledger-latency");
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(ApiMetrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.observe(
                        ApiOperation::GetRowsByKeyPrefix,
                        "svc",
                        Duration::from_micros(1),
                    );
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot(ApiOperation::GetRowsByKeyPrefix);
        assert_eq!(snapshot.observations, 800);
        assert_eq!(snapshot.total_us, 800);
    }
}
