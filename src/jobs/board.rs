//! Registry of tracked jobs, keyed by document id.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{DocumentView, DocumentsApi};
use crate::jobs::tracker::JobTracker;

/// Concurrent set of job trackers sharing one documents API and interval.
#[derive(Clone)]
pub struct JobBoard {
    documents: DocumentsApi,
    interval: Duration,
    trackers: Arc<DashMap<String, Arc<JobTracker>>>,
}

impl JobBoard {
    pub fn new(documents: DocumentsApi, interval: Duration) -> Self {
        Self {
            documents,
            interval,
            trackers: Arc::new(DashMap::new()),
        }
    }

    /// Start (or restart) tracking `view`. A previous tracker for the same id
    /// is dropped, which stops its polling.
    pub fn track(&self, view: DocumentView) -> Arc<JobTracker> {
        let tracker = Arc::new(JobTracker::watch(self.documents.clone(), view, self.interval));
        self.trackers.insert(tracker.id().to_string(), tracker.clone());
        tracker
    }

    pub fn get(&self, id: &str) -> Option<Arc<JobTracker>> {
        self.trackers.get(id).map(|t| t.value().clone())
    }

    pub fn untrack(&self, id: &str) -> bool {
        match self.trackers.remove(id) {
            Some((_, tracker)) => {
                tracker.stop();
                true
            }
            None => false,
        }
    }

    pub fn views(&self) -> Vec<DocumentView> {
        let mut views: Vec<DocumentView> = self.trackers.iter().map(|t| t.value().view()).collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    /// Trackers still polling.
    pub fn active_count(&self) -> usize {
        self.trackers.iter().filter(|t| t.value().is_polling()).count()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn stop_all(&self) {
        for tracker in self.trackers.iter() {
            tracker.value().stop();
        }
    }
}

impl std::fmt::Debug for JobBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobBoard")
            .field("tracked", &self.len())
            .field("active", &self.active_count())
            .finish()
    }
}
