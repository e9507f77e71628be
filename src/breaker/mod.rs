//! Circuit breaker visibility and control.
//!
//! # Data Flow
//! ```text
//! BreakerMonitor (PollTask)
//!     → GET /documents/async/dashboard/circuit-breaker/status
//!     → BreakerSnapshot (state, counts, threshold)
//!
//! BreakerMonitor::reset
//!     → POST /documents/async/dashboard/circuit-breaker/reset
//!     → next poll reflects the server's new state
//! ```
//!
//! The trip logic lives in the backend; nothing here opens or closes it.

pub mod monitor;
pub mod state;

pub use monitor::BreakerMonitor;
pub use state::{BreakerSnapshot, BreakerState};
