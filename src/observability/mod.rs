//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Terminal or log aggregation (pretty / JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (request_id, document_id) instead of formatted strings
//! - Request ID flows through gateway, refresh and replay
//! - Metrics are cheap (facade no-ops without a recorder)

pub mod logging;
pub mod metrics;
