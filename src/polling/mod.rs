//! Polling subsystem.
//!
//! # Data Flow
//! ```text
//! PollTask::start(probe, options)
//!     → probe immediately
//!     → record value/error in PollSnapshot (watch channel)
//!     → sleep interval (measured from completion)
//!     → repeat until stop / disable / predicate / drop
//!
//! Consumers:
//!     → jobs::JobTracker (stops on terminal status)
//!     → breaker::BreakerMonitor (runs until stopped)
//!     → CLI metrics watch
//! ```

pub mod scheduler;

pub use scheduler::{PollOptions, PollPhase, PollSnapshot, PollTask};
