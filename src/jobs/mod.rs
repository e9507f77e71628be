//! Job tracking subsystem.
//!
//! # Data Flow
//! ```text
//! upload / lookup → DocumentView
//!     → JobTracker (PollTask over GET /documents/async/{id}/status)
//!     → merged DocumentView per probe
//!     → COMPLETED | FAILED → polling stops
//!
//! JobBoard: many trackers by document id
//! ```

pub mod board;
pub mod tracker;

pub use board::JobBoard;
pub use tracker::JobTracker;
