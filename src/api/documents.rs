//! Document submission, status and webhook endpoints.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::api::models::{DocumentPage, DocumentView, MessageAck, StatusReport, UploadAccepted, WebhookAck};
use crate::config::UploadConfig;
use crate::error::{ApiError, ApiResult};
use crate::gateway::transport::long_poll_deadline;
use crate::gateway::{ApiRequest, FilePart, Gateway};
use crate::resilience::TimeoutPolicy;

/// A file ready to be submitted.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Arc<[u8]>,
    /// Overrides the configured processing timeout.
    pub processing_timeout_ms: Option<u64>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
            processing_timeout_ms: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_processing_timeout(mut self, timeout_ms: u64) -> Self {
        self.processing_timeout_ms = Some(timeout_ms);
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Validation(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::Validation(format!("{} is not a file", path.display())))?;
        Ok(Self::new(file_name, bytes))
    }

    /// Declared content type, or one inferred from the file extension.
    pub fn resolved_content_type(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| infer_content_type(&self.file_name).to_string())
    }

    /// Check emptiness, size and type before anything touches the network.
    pub fn validate(&self, limits: &UploadConfig) -> ApiResult<()> {
        if self.bytes.is_empty() {
            return Err(ApiError::Validation("file is empty".into()));
        }
        if self.bytes.len() as u64 > limits.max_bytes {
            return Err(ApiError::Validation(format!(
                "file is {} bytes, limit is {} bytes",
                self.bytes.len(),
                limits.max_bytes
            )));
        }
        let content_type = self.resolved_content_type();
        if !limits.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&content_type)) {
            return Err(ApiError::Validation(format!("unsupported file type: {content_type}")));
        }
        Ok(())
    }
}

pub fn infer_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn check_id(id: &str) -> ApiResult<()> {
    if id.trim().is_empty() || id.contains(['/', '?', '#']) {
        return Err(ApiError::Validation(format!("invalid document id: {id:?}")));
    }
    Ok(())
}

fn document_path(id: &str, suffix: &str) -> ApiResult<String> {
    check_id(id)?;
    Ok(format!("/documents/async/{id}{suffix}"))
}

fn validate_webhook_url(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw).map_err(|e| ApiError::Validation(format!("invalid webhook url: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(ApiError::Validation(format!("webhook url must be http(s): {raw}"))),
    }
}

#[derive(Debug, Clone)]
pub struct DocumentsApi {
    gateway: Gateway,
    limits: UploadConfig,
    timeouts: TimeoutPolicy,
}

impl DocumentsApi {
    pub fn new(gateway: Gateway, limits: UploadConfig, timeouts: TimeoutPolicy) -> Self {
        Self {
            gateway,
            limits,
            timeouts,
        }
    }

    /// Submit a file for asynchronous processing.
    pub async fn upload(&self, upload: Upload) -> ApiResult<UploadAccepted> {
        upload.validate(&self.limits)?;
        let timeout_ms = self
            .timeouts
            .clamp_millis(upload.processing_timeout_ms.unwrap_or(self.limits.processing_timeout_ms));

        let part = FilePart {
            field: "file".into(),
            file_name: upload.file_name.clone(),
            content_type: upload.resolved_content_type(),
            bytes: upload.bytes.clone(),
        };
        let request = ApiRequest::post("/documents/async/upload")
            .query("timeoutMs", timeout_ms)
            .multipart(part);

        let accepted: UploadAccepted = self.gateway.execute_json(request).await?;
        tracing::info!(
            document_id = %accepted.document_id,
            file_name = %upload.file_name,
            size = upload.bytes.len(),
            "Document submitted"
        );
        Ok(accepted)
    }

    pub async fn status(&self, id: &str) -> ApiResult<StatusReport> {
        let path = document_path(id, "/status")?;
        self.gateway.execute_json(ApiRequest::get(path)).await
    }

    /// Long-poll: the backend holds the call until the status changes or
    /// `wait` elapses.
    pub async fn await_status(&self, id: &str, wait: Duration) -> ApiResult<StatusReport> {
        let path = document_path(id, "/status/polling")?;
        let wait = self.timeouts.long_poll_wait(wait);
        let request = ApiRequest::get(path)
            .query("timeoutMs", wait.as_millis() as u64)
            .timeout(long_poll_deadline(wait));
        self.gateway.execute_json(request).await
    }

    pub async fn document(&self, id: &str) -> ApiResult<DocumentView> {
        check_id(id)?;
        self.gateway
            .execute_json(ApiRequest::get(format!("/documents/{id}")))
            .await
    }

    pub async fn list(&self, page: u32, size: u32) -> ApiResult<DocumentPage> {
        let request = ApiRequest::get("/documents")
            .query("page", page)
            .query("size", size.clamp(1, 100));
        self.gateway.execute_json(request).await
    }

    /// Ask the backend to notify `webhook_url` when the job finishes.
    pub async fn register_webhook(&self, id: &str, webhook_url: &str) -> ApiResult<WebhookAck> {
        let url = validate_webhook_url(webhook_url)?;
        let path = document_path(id, "/webhook/register")?;
        // Sent as both body and query parameter; backends read one or the other.
        let request = ApiRequest::post(path)
            .query("webhookUrl", url.as_str())
            .json(&serde_json::json!({ "webhookUrl": url.as_str() }))?;

        let ack: WebhookAck = self.gateway.execute_json(request).await?;
        tracing::info!(document_id = %id, webhook_url = %url, "Webhook registered");
        Ok(ack)
    }

    pub async fn unregister_webhook(&self, id: &str) -> ApiResult<MessageAck> {
        let path = document_path(id, "/webhook")?;
        let ack = self.gateway.execute_json(ApiRequest::delete(path)).await?;
        tracing::info!(document_id = %id, "Webhook unregistered");
        Ok(ack)
    }
}
