//! Resilient client for the asynchronous document-processing API

pub mod api;
pub mod breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod lifecycle;
pub mod observability;
pub mod polling;
pub mod resilience;
pub mod session;

pub use client::ApiClient;
pub use config::schema::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use lifecycle::Shutdown;
