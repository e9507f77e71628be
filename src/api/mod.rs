//! Typed backend API.
//!
//! Thin wrappers that build [`ApiRequest`](crate::gateway::ApiRequest)s,
//! run them through the gateway and decode the answers. Client-side
//! validation (upload limits, webhook URLs, document ids) happens here,
//! before any network call.

pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod models;

pub use auth::AuthApi;
pub use dashboard::DashboardApi;
pub use documents::{DocumentsApi, Upload};
pub use models::{
    DashboardMetrics, DocumentPage, DocumentView, JobStatus, MessageAck, PipelineHealth, QueueStatus,
    StatusReport, UploadAccepted, WebhookAck,
};
