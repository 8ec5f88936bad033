//! Latency observation scope
//!
//! Starts timing when created and records the elapsed time when dropped,
//! so every exit path of a handler is measured.

use std::sync::Arc;
use std::time::Instant;

use super::metrics::{ApiOperation, LatencyRecorder};

/// Times one handler invocation.
///
/// ```ignore
/// let _latency = LatencyObservation::start(recorder, ApiOperation::Ping, "curl/8.0");
/// // ... handle the request ...
/// // sample recorded here, on drop
/// ```
pub struct LatencyObservation {
    recorder: Arc<dyn LatencyRecorder>,
    op: ApiOperation,
    user_agent: String,
    start: Instant,
}

impl LatencyObservation {
    pub fn start(
        recorder: Arc<dyn LatencyRecorder>,
        op: ApiOperation,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            recorder,
            op,
            user_agent: user_agent.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyObservation {
    fn drop(&mut self) {
        self.recorder
            .observe(self.op, &self.user_agent, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::ApiMetrics;
    use std::time::Duration;

    #[test]
    fn test_records_on_drop() {
        let metrics = Arc::new(ApiMetrics::new());
        {
            let _obs = LatencyObservation::start(metrics.clone(), ApiOperation::Ping, "test");
            std::thread::sleep(Duration::from_millis(2));
            assert_eq!(metrics.snapshot(ApiOperation::Ping).observations, 0);
        }

        let snapshot = metrics.snapshot(ApiOperation::Ping);
        assert_eq!(snapshot.observations, 1);
        assert!(snapshot.total_us >= 2_000);
    }

    #[test]
    fn test_records_on_early_return() {
        fn check(metrics: Arc<ApiMetrics>, healthy: bool) -> Result<(), String> {
            let _obs = LatencyObservation::start(metrics, ApiOperation::Healthcheck, "");
            if !healthy {
                return Err("replica unreachable".to_string());
            }
            Ok(())
        }

        let metrics = Arc::new(ApiMetrics::new());
        assert!(check(metrics.clone(), false).is_err());
        assert_eq!(metrics.snapshot(ApiOperation::Healthcheck).observations, 1);
    }
}
