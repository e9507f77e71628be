//! Client error taxonomy.
//!
//! Only [`ApiError::AuthExpired`] is intercepted inside the client (refresh and
//! replay). Every other kind reaches the caller unchanged.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by gateway calls and the typed API wrappers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The access token was rejected (HTTP 401).
    #[error("Access token expired or invalid")]
    AuthExpired,

    /// Refresh failed or no refresh token was stored; the session is gone.
    #[error("Session terminated, please log in again")]
    SessionTerminated,

    /// Client-side precondition failed before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network failure (connect, reset, DNS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call exceeded its deadline.
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Non-auth 4xx/5xx from the backend, passed through verbatim.
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The backend answered 2xx with a body we could not decode.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Network or timeout failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Timeout(_))
    }

    /// Authorization-related failure (recoverable or not).
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::AuthExpired | ApiError::SessionTerminated)
    }

    /// HTTP status for server-class errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::AuthExpired => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Result type for client operations.
pub type ApiResult<T> = Result<T, ApiError>;
