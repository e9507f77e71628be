//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C)          → Shutdown::trigger(Interrupted)
//!     SessionEvent::Terminated → Shutdown::trigger(SessionEnded)
//!
//! Shutdown (shutdown.rs):
//!     first trigger wins → long-running commands stop their pollers and exit
//! ```
//!
//! # Design Decisions
//! - One stop reason per process; later triggers are ignored
//! - Late subscribers still observe a stop that already happened

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, StopReason};
