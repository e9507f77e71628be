//! Breaker visibility.
//!
//! # Responsibilities
//! - Poll the backend breaker status on a fixed interval
//! - Expose the latest snapshot and failure rate
//! - Forward reset commands; the next poll shows the outcome
//!
//! # Design Decisions
//! - Monitoring does not depend on the breaker state: it runs while OPEN too
//! - Reset never mutates local state optimistically

use std::time::Duration;
use tokio::sync::watch;

use crate::api::{DashboardApi, MessageAck};
use crate::breaker::state::BreakerSnapshot;
use crate::error::{ApiError, ApiResult};
use crate::polling::{PollOptions, PollSnapshot, PollTask};

pub struct BreakerMonitor {
    dashboard: DashboardApi,
    task: PollTask<BreakerSnapshot, ApiError>,
}

impl BreakerMonitor {
    pub fn start(dashboard: DashboardApi, interval: Duration) -> Self {
        let api = dashboard.clone();
        let probe = move || {
            let api = api.clone();
            async move { api.breaker_status().await }
        };
        let task = PollTask::start(probe, PollOptions::new(interval).resource("breaker"));
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Breaker monitor started");
        Self { dashboard, task }
    }

    /// Latest observed snapshot, if any poll has succeeded.
    pub fn status(&self) -> Option<BreakerSnapshot> {
        self.task.latest_value()
    }

    /// Failure rate of the latest snapshot; 0 before the first observation.
    pub fn failure_rate(&self) -> f64 {
        self.status().map_or(0.0, |s| s.failure_rate())
    }

    pub fn latest_error(&self) -> Option<ApiError> {
        self.task.latest_error()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot<BreakerSnapshot, ApiError>> {
        self.task.subscribe()
    }

    /// Request a backend reset. [`status`](Self::status) keeps the previous
    /// snapshot until the next poll.
    pub async fn reset(&self) -> ApiResult<MessageAck> {
        let previous = self.status().map(|s| s.state);
        let ack = self.dashboard.reset_breaker().await?;
        tracing::info!(previous_state = ?previous, "Breaker reset acknowledged, awaiting next poll");
        Ok(ack)
    }

    pub fn stop(&self) {
        self.task.stop();
    }
}

impl std::fmt::Debug for BreakerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerMonitor")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use crate::gateway::testing::ScriptedTransport;
    use crate::gateway::{ApiResponse, Gateway};
    use crate::session::{CredentialStore, MemoryStore, SessionManager};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn monitor(interval: Duration) -> (Arc<ScriptedTransport>, BreakerMonitor) {
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(ScriptedTransport::new(Box::new(move |req, _| {
            if req.path().ends_with("/reset") {
                closed.store(true, Ordering::SeqCst);
                return Ok(ApiResponse::new(200, r#"{"message":"Circuit breaker reset successfully"}"#));
            }
            let body = if closed.load(Ordering::SeqCst) {
                r#"{"state":"CLOSED","successCount":0,"failureCount":0,"failureThreshold":50}"#
            } else {
                r#"{"state":"OPEN","successCount":2,"failureCount":8,"failureThreshold":50}"#
            };
            Ok(ApiResponse::new(200, body))
        })));
        let store = Arc::new(CredentialStore::init(Arc::new(MemoryStore::new())));
        let gateway = Gateway::new(transport.clone(), SessionManager::new(store, transport.clone()));
        (transport, BreakerMonitor::start(DashboardApi::new(gateway), interval))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_waits_for_next_poll() {
        let (transport, monitor) = monitor(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let snapshot = monitor.status().unwrap();
        assert_eq!(snapshot.state, BreakerState::Open);
        assert!((monitor.failure_rate() - 0.8).abs() < 1e-9);

        let ack = monitor.reset().await.unwrap();
        assert!(ack.message.is_some());
        assert_eq!(monitor.status().unwrap().state, BreakerState::Open);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let snapshot = monitor.status().unwrap();
        assert_eq!(snapshot.state, BreakerState::Closed);
        assert_eq!(monitor.failure_rate(), 0.0);
        assert_eq!(transport.calls_to("/documents/async/dashboard/circuit-breaker/reset"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_while_open() {
        let (transport, monitor) = monitor(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert!(monitor.status().unwrap().is_open());
        assert_eq!(
            transport.calls_to("/documents/async/dashboard/circuit-breaker/status"),
            5
        );

        monitor.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            transport.calls_to("/documents/async/dashboard/circuit-breaker/status"),
            5
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_rate_before_first_poll() {
        let (_, monitor) = monitor(Duration::from_secs(5));
        assert_eq!(monitor.failure_rate(), 0.0);
        assert!(monitor.status().is_none());
    }
}
