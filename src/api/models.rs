//! Backend resource shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Processing status of a document job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any status this client does not know yet. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of the status and long-poll status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub document_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Document record as the caller sees it while tracking a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    #[serde(alias = "documentId")]
    pub id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Backend timestamp of the latest merged status report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_checked_at: Option<i64>,
}

impl DocumentView {
    /// A view that only knows the id and status.
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            original_name: None,
            document_type: None,
            extracted_text: None,
            classification_label: None,
            classification_confidence: None,
            created_at: None,
            status_checked_at: None,
        }
    }

    /// Merge a status report without dropping previously known fields.
    pub fn merge_status(&mut self, report: &StatusReport) {
        self.status = report.status;
        if report.timestamp.is_some() {
            self.status_checked_at = report.timestamp;
        }
    }

    pub fn merged(&self, report: &StatusReport) -> Self {
        let mut next = self.clone();
        next.merge_status(report);
        next
    }
}

/// Upload acknowledgement. Processing continues in the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    #[serde(alias = "id")]
    pub document_id: String,
    #[serde(default = "UploadAccepted::default_status")]
    pub status: JobStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadAccepted {
    fn default_status() -> JobStatus {
        JobStatus::Processing
    }

    pub fn into_view(self, original_name: Option<String>) -> DocumentView {
        let mut view = DocumentView::new(self.document_id, self.status);
        view.original_name = original_name;
        view
    }
}

/// One page of the document listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPage {
    #[serde(default)]
    pub content: Vec<DocumentView>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

/// Webhook registration acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate processing metrics from the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardMetrics {
    pub total_processed: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub avg_processing_time: f64,
    /// Fields this client does not model (breaker summary, webhook count...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Health summary of the async processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineHealth {
    pub status: String,
    #[serde(default)]
    pub circuit_breaker_healthy: bool,
    #[serde(default)]
    pub active_webhooks: u64,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Background queue depth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueStatus {
    pub active_retries: u64,
    pub active_webhooks: u64,
    pub timestamp: Option<i64>,
}

/// Plain `{message}` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageAck {
    pub message: Option<String>,
}
