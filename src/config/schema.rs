//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the document-processing client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend API location.
    pub api: ApiConfig,

    /// Per-call timeout bounds.
    pub timeouts: TimeoutConfig,

    /// Poll intervals for jobs and dashboard resources.
    pub polling: PollingConfig,

    /// Client-side upload limits.
    pub upload: UploadConfig,

    /// Credential persistence.
    pub credentials: CredentialConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to (e.g., "http://localhost:8080/api").
    pub base_url: String,

    /// User-Agent header sent on every call.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            user_agent: concat!("docflow-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout used when the caller does not specify one, in milliseconds.
    pub default_ms: u64,

    /// Lower bound for caller-specified timeouts, in milliseconds.
    pub min_ms: u64,

    /// Upper bound for caller-specified timeouts, in milliseconds.
    pub max_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 30_000,
            min_ms: 1_000,
            max_ms: 300_000,
        }
    }
}

/// Polling intervals, measured from the completion of the previous probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Job status poll interval in milliseconds.
    pub job_interval_ms: u64,

    /// Circuit breaker poll interval in milliseconds.
    pub breaker_interval_ms: u64,

    /// Dashboard metrics poll interval in milliseconds.
    pub metrics_interval_ms: u64,
}

impl PollingConfig {
    pub fn job_interval(&self) -> Duration {
        Duration::from_millis(self.job_interval_ms)
    }

    pub fn breaker_interval(&self) -> Duration {
        Duration::from_millis(self.breaker_interval_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            job_interval_ms: 3_000,
            breaker_interval_ms: 5_000,
            metrics_interval_ms: 5_000,
        }
    }
}

/// Upload validation limits, enforced before any network call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum file size in bytes.
    pub max_bytes: u64,

    /// Accepted MIME types.
    pub allowed_types: Vec<String>,

    /// Server-side processing timeout sent as `timeoutMs`.
    pub processing_timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            allowed_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/tiff".to_string(),
                "text/plain".to_string(),
            ],
            processing_timeout_ms: 30_000,
        }
    }
}

/// Credential persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialConfig {
    /// JSON file holding the persisted session. `None` keeps credentials in memory.
    pub path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
