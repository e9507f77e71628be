//! Single job tracking.
//!
//! # Responsibilities
//! - Poll a job's status until it is COMPLETED or FAILED
//! - Merge each status into the caller's view, keeping fields already known
//! - Skip polling entirely for a job that is already terminal

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::{DocumentView, DocumentsApi, StatusReport};
use crate::error::{ApiError, ApiResult};
use crate::polling::{PollOptions, PollPhase, PollSnapshot, PollTask};

/// A tracked job. Polling stops when the job ends or the tracker is dropped.
pub struct JobTracker {
    initial: DocumentView,
    task: Option<PollTask<DocumentView, ApiError>>,
}

impl JobTracker {
    /// Track `view` by polling the documents API every `interval`.
    pub fn watch(documents: DocumentsApi, view: DocumentView, interval: Duration) -> Self {
        let id = view.id.clone();
        Self::watch_with(view, interval, move || {
            let documents = documents.clone();
            let id = id.clone();
            async move { documents.status(&id).await }
        })
    }

    /// Track `view` with a custom status source.
    pub fn watch_with<F, Fut>(view: DocumentView, interval: Duration, fetch_status: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<StatusReport>> + Send + 'static,
    {
        if view.status.is_terminal() {
            tracing::debug!(document_id = %view.id, status = %view.status, "Job already finished, not polling");
            return Self {
                initial: view,
                task: None,
            };
        }

        tracing::debug!(document_id = %view.id, interval_ms = interval.as_millis() as u64, "Tracking job");
        let base = view.clone();
        let probe = move || {
            let status = fetch_status();
            let base = base.clone();
            async move {
                let report = status.await?;
                let merged = base.merged(&report);
                if merged.status.is_terminal() {
                    tracing::info!(document_id = %merged.id, status = %merged.status, "Job finished");
                }
                Ok(merged)
            }
        };

        let options = PollOptions::new(interval)
            .resource("job")
            .stop_when(|v: &DocumentView| v.status.is_terminal());

        Self {
            initial: view,
            task: Some(PollTask::start(probe, options)),
        }
    }

    pub fn id(&self) -> &str {
        &self.initial.id
    }

    /// Best known view: the latest merged status, or the starting view.
    pub fn view(&self) -> DocumentView {
        self.task
            .as_ref()
            .and_then(|t| t.latest_value())
            .unwrap_or_else(|| self.initial.clone())
    }

    pub fn latest_error(&self) -> Option<ApiError> {
        self.task.as_ref().and_then(|t| t.latest_error())
    }

    pub fn is_polling(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|t| !matches!(t.phase(), PollPhase::Cancelled | PollPhase::Idle))
    }

    pub fn is_fetching(&self) -> bool {
        self.task.as_ref().is_some_and(|t| t.is_fetching())
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<PollSnapshot<DocumentView, ApiError>>> {
        self.task.as_ref().map(|t| t.subscribe())
    }

    /// Stop polling without waiting for a terminal status.
    pub fn stop(&self) {
        if let Some(task) = &self.task {
            task.stop();
        }
    }

    /// Resolve once the job is terminal or polling was stopped.
    pub async fn wait_terminal(&self) -> DocumentView {
        let Some(mut rx) = self.subscribe() else {
            return self.initial.clone();
        };

        loop {
            {
                let snapshot = rx.borrow_and_update();
                if let Some(view) = &snapshot.latest_value {
                    if view.status.is_terminal() {
                        return view.clone();
                    }
                }
                if snapshot.phase == PollPhase::Cancelled {
                    return snapshot.latest_value.clone().unwrap_or_else(|| self.initial.clone());
                }
            }
            if rx.changed().await.is_err() {
                return self.view();
            }
        }
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("id", &self.initial.id)
            .field("polling", &self.is_polling())
            .finish()
    }
}
