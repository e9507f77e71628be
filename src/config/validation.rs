//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout bounds ordered, intervals > 0)
//! - Check the API base URL is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("api.base_url", e.to_string())),
    }

    let t = &config.timeouts;
    if t.min_ms == 0 {
        errors.push(ValidationError::new("timeouts.min_ms", "must be greater than 0"));
    }
    if t.min_ms > t.max_ms {
        errors.push(ValidationError::new(
            "timeouts.max_ms",
            format!("must be >= min_ms ({})", t.min_ms),
        ));
    }
    if t.default_ms < t.min_ms || t.default_ms > t.max_ms {
        errors.push(ValidationError::new(
            "timeouts.default_ms",
            format!("must lie within [{}, {}]", t.min_ms, t.max_ms),
        ));
    }

    let p = &config.polling;
    for (field, value) in [
        ("polling.job_interval_ms", p.job_interval_ms),
        ("polling.breaker_interval_ms", p.breaker_interval_ms),
        ("polling.metrics_interval_ms", p.metrics_interval_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.upload.max_bytes == 0 {
        errors.push(ValidationError::new("upload.max_bytes", "must be greater than 0"));
    }
    if config.upload.allowed_types.is_empty() {
        errors.push(ValidationError::new("upload.allowed_types", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
