//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → timeouts.rs (bounded deadline per call)
//!     → gateway (401 → session refresh + single replay)
//!     → polling (failed probe recorded, schedule continues)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Replays are bounded to one per request (attempt counter on the request)
//! - Refresh is single-flight; see `session::manager`

pub mod timeouts;

pub use timeouts::{TimeoutPolicy, LONG_POLL_GRACE};
