//! HTTP transport.
//!
//! # Responsibilities
//! - Turn an [`ApiRequest`] into a real HTTP call with the bearer token attached
//! - Enforce the resolved deadline on every call
//! - Return any HTTP status as a response; only network failures are errors

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::gateway::request::{ApiRequest, ApiResponse, RequestBody, REQUEST_ID_HEADER};
use crate::observability::metrics;
use crate::resilience::{TimeoutPolicy, LONG_POLL_GRACE};

/// Sends requests to the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest, access_token: Option<&str>) -> ApiResult<ApiResponse>;
}

/// reqwest-backed transport rooted at the configured API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeouts: TimeoutPolicy,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig, timeouts: TimeoutPolicy) -> ApiResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Validation(format!("invalid base url: {e}")))?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            timeouts,
        })
    }

    fn url_for(&self, path: &str) -> ApiResult<Url> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| ApiError::Validation(format!("invalid request path {path}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest, access_token: Option<&str>) -> ApiResult<ApiResponse> {
        let url = self.url_for(request.path())?;
        let deadline = self.timeouts.resolve(request.requested_timeout());

        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .header(REQUEST_ID_HEADER, request.id().to_string());

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.content_type)
                    .map_err(|e| ApiError::Validation(format!("invalid content type: {e}")))?;
                builder.multipart(Form::new().part(file.field.clone(), part))
            }
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(deadline, async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(ApiResponse::new(status, body.to_vec()))
        })
        .await;

        let result = match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(ApiError::Timeout(deadline)),
            Ok(Err(e)) => Err(ApiError::Transport(e.to_string())),
            Err(_) => Err(ApiError::Timeout(deadline)),
        };

        let status = result.as_ref().ok().map(|r| r.status);
        metrics::record_request(request.method().as_str(), status, started);

        match &result {
            Ok(response) => tracing::debug!(
                request_id = %request.id(),
                method = %request.method(),
                path = %request.path(),
                status = response.status,
                attempt = request.attempt(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            ),
            Err(e) => tracing::debug!(
                request_id = %request.id(),
                method = %request.method(),
                path = %request.path(),
                error = %e,
                "Request failed"
            ),
        }

        result
    }
}

/// HTTP deadline for a long-poll that waits `wait` server-side. Pair with
/// [`TimeoutPolicy::long_poll_wait`] so the deadline stays within bounds.
pub fn long_poll_deadline(wait: Duration) -> Duration {
    wait + LONG_POLL_GRACE
}
