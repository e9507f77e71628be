//! Processing dashboard endpoints.

use crate::api::models::{DashboardMetrics, MessageAck, PipelineHealth, QueueStatus};
use crate::breaker::BreakerSnapshot;
use crate::error::ApiResult;
use crate::gateway::{ApiRequest, Gateway};
use crate::observability::metrics;

const BASE: &str = "/documents/async/dashboard";

#[derive(Debug, Clone)]
pub struct DashboardApi {
    gateway: Gateway,
}

impl DashboardApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn metrics(&self) -> ApiResult<DashboardMetrics> {
        self.gateway
            .execute_json(ApiRequest::get(format!("{BASE}/metrics")))
            .await
    }

    pub async fn breaker_status(&self) -> ApiResult<BreakerSnapshot> {
        self.gateway
            .execute_json(ApiRequest::get(format!("{BASE}/circuit-breaker/status")))
            .await
    }

    /// Ask the backend to close its breaker. Local state is untouched; the
    /// next status poll reflects the result.
    pub async fn reset_breaker(&self) -> ApiResult<MessageAck> {
        let ack: MessageAck = self
            .gateway
            .execute_json(ApiRequest::post(format!("{BASE}/circuit-breaker/reset")))
            .await?;
        metrics::record_breaker_reset();
        tracing::info!(message = ack.message.as_deref().unwrap_or(""), "Circuit breaker reset requested");
        Ok(ack)
    }

    pub async fn health(&self) -> ApiResult<PipelineHealth> {
        self.gateway
            .execute_json(ApiRequest::get(format!("{BASE}/health")))
            .await
    }

    pub async fn queue(&self) -> ApiResult<QueueStatus> {
        self.gateway
            .execute_json(ApiRequest::get(format!("{BASE}/queue")))
            .await
    }
}
