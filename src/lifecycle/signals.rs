//! Signal and session-event handling.
//!
//! # Responsibilities
//! - Translate Ctrl-C into a shutdown
//! - Translate session termination into a shutdown that asks for a new login
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A lagged event receiver keeps listening; only `Terminated` matters

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{Shutdown, StopReason};
use crate::session::SessionEvent;

/// Trigger `Interrupted` on Ctrl-C.
pub fn spawn_interrupt_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, shutting down");
                shutdown.trigger(StopReason::Interrupted);
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    })
}

/// Trigger `SessionEnded` the first time the session is terminated.
pub fn spawn_session_listener(
    mut events: broadcast::Receiver<SessionEvent>,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Terminated) => {
                    shutdown.trigger(StopReason::SessionEnded);
                    return;
                }
                Ok(event) => tracing::debug!(?event, "Session event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Session event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_termination_triggers_shutdown() {
        let (tx, rx) = broadcast::channel(4);
        let shutdown = Shutdown::new();
        let handle = spawn_session_listener(rx, shutdown.clone());

        tx.send(SessionEvent::Refreshed).unwrap();
        tx.send(SessionEvent::Terminated).unwrap();
        handle.await.unwrap();

        assert_eq!(shutdown.reason(), Some(StopReason::SessionEnded));
    }

    #[tokio::test]
    async fn test_closed_channel_ends_listener() {
        let (tx, rx) = broadcast::channel::<SessionEvent>(4);
        let shutdown = Shutdown::new();
        let handle = spawn_session_listener(rx, shutdown.clone());

        drop(tx);
        handle.await.unwrap();
        assert!(!shutdown.is_triggered());
    }
}
