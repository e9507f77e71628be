//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! login (api::auth)
//!     → CredentialStore::establish (persist + LoggedIn)
//!
//! 401 from gateway
//!     → SessionManager::on_unauthorized
//!         → first 401: start refresh episode, queue request
//!         → during refresh: queue request
//!     → refresh ok:   replace tokens, replay queue FIFO
//!     → refresh fail: reject queue, CredentialStore::terminate (Terminated once)
//! ```
//!
//! # Design Decisions
//! - One refresh in flight per client, regardless of how many calls hit a 401
//! - Termination is announced through a broadcast channel; the embedding
//!   application decides how to send the user back to login

pub mod manager;
pub mod store;
pub mod types;

pub use manager::SessionManager;
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore};
pub use types::{Session, SessionEvent, TokenPair, UserProfile};
