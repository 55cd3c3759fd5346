//! Heartbeat-based liveness detection
//!
//! While the session is live, a probe task emits `stream:heartbeat` over the
//! signaling channel on a fixed interval and reports each outcome back into
//! the session loop. The failure counter lives with the session state, not
//! the task: inbound probes from the backend are a decoupled channel of the
//! same liveness signal and also reset it.
//!
//! Only signaling probe failures count toward the threshold; backend REST
//! failures are logged elsewhere and never increment the counter.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::signaling::{event, SignalingChannel};

/// Consecutive-failure counter for one live session.
#[derive(Debug, Clone)]
pub struct HeartbeatRecord {
    consecutive_failures: u32,
    failure_threshold: u32,
}

impl HeartbeatRecord {
    #[must_use]
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            failure_threshold,
        }
    }

    /// Any successful probe (outbound ack or inbound request) resets the
    /// streak, even mid-escalation.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Returns the new failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the failure threshold has been reached and teardown should
    /// be triggered.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.failure_threshold
    }
}

/// Handle to the running probe task.
pub(crate) struct HeartbeatMonitor {
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    /// Spawn the probe loop. Each tick emits a probe and calls `on_outcome`
    /// with whether it was acknowledged within the tick window.
    pub(crate) fn spawn(
        signaling: Arc<dyn SignalingChannel>,
        interval: Duration,
        on_outcome: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so the first
            // probe goes out one full interval after going live.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!("heartbeat monitor stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let acked = if signaling.is_connected() {
                    match tokio::time::timeout(
                        interval,
                        signaling.request(event::STREAM_HEARTBEAT, serde_json::json!({})),
                    )
                    .await
                    {
                        Ok(Ok(_)) => true,
                        Ok(Err(e)) => {
                            warn!(error = %e, "heartbeat probe failed");
                            false
                        }
                        Err(_) => {
                            warn!("heartbeat probe not acknowledged within tick window");
                            false
                        }
                    }
                } else {
                    warn!("signaling channel disconnected during heartbeat tick");
                    false
                };

                on_outcome(acked);
            }
        });

        Self { cancel }
    }

    pub(crate) fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::test_support::MockSignaling;

    #[test]
    fn test_record_resets_on_success() {
        let mut record = HeartbeatRecord::new(5);
        record.record_failure();
        record.record_failure();
        record.record_failure();
        assert_eq!(record.consecutive_failures(), 3);
        assert!(!record.is_exhausted());

        // Mid-streak success resets to zero.
        record.record_success();
        assert_eq!(record.consecutive_failures(), 0);
    }

    #[test]
    fn test_record_exhausts_at_threshold() {
        let mut record = HeartbeatRecord::new(5);
        for _ in 0..4 {
            record.record_failure();
            assert!(!record.is_exhausted());
        }
        record.record_failure();
        assert!(record.is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reports_acked_probes() {
        let signaling = Arc::new(MockSignaling::new());
        let outcomes = Arc::new(AtomicU32::new(0));
        let failures = Arc::new(AtomicU32::new(0));

        let outcomes_clone = Arc::clone(&outcomes);
        let failures_clone = Arc::clone(&failures);
        let monitor = HeartbeatMonitor::spawn(
            signaling.clone(),
            Duration::from_secs(25),
            move |acked| {
                outcomes_clone.fetch_add(1, Ordering::SeqCst);
                if !acked {
                    failures_clone.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(80)).await;
        monitor.stop();
        tokio::task::yield_now().await;

        assert!(outcomes.load(Ordering::SeqCst) >= 3);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reports_failures_when_disconnected() {
        let signaling = Arc::new(MockSignaling::new());
        signaling.set_connected(false);

        let failures = Arc::new(AtomicU32::new(0));
        let failures_clone = Arc::clone(&failures);
        let monitor = HeartbeatMonitor::spawn(
            signaling.clone(),
            Duration::from_secs(25),
            move |acked| {
                if !acked {
                    failures_clone.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(130)).await;
        monitor.stop();
        tokio::task::yield_now().await;

        assert!(failures.load(Ordering::SeqCst) >= 5);
    }
}
