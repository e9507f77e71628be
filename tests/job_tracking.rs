//! Job tracking against a live mock backend.

use std::sync::atomic::Ordering;
use std::time::Duration;

use docflow_client::api::{DocumentView, JobStatus};

mod common;

#[tokio::test]
async fn test_tracker_stops_at_completed() {
    let (state, client) = common::logged_in().await;
    state.script_statuses(&["PROCESSING", "PROCESSING", "COMPLETED"]);

    let tracker = client.track_job(DocumentView::new("doc-1", JobStatus::Processing));
    let done = tokio::time::timeout(Duration::from_secs(5), tracker.wait_terminal())
        .await
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(state.status_probes.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(state.status_probes.load(Ordering::SeqCst), 3);
    assert!(!tracker.is_polling());
}

#[tokio::test]
async fn test_tracker_survives_refresh_mid_polling() {
    let (state, client) = common::logged_in().await;
    state.script_statuses(&["PROCESSING", "PROCESSING", "FAILED"]);

    let tracker = client.track_job(DocumentView::new("doc-2", JobStatus::Pending));
    assert!(common::eventually(Duration::from_secs(5), || state.status_probes.load(Ordering::SeqCst) >= 1).await);
    state.expire_access_token();

    let done = tokio::time::timeout(Duration::from_secs(5), tracker.wait_terminal())
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(tracker.latest_error().is_none());
}

#[tokio::test]
async fn test_finished_job_is_not_polled() {
    let (state, client) = common::logged_in().await;

    let tracker = client.track_job(DocumentView::new("doc-3", JobStatus::Completed));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(state.status_probes.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.view().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_long_poll_status() {
    let (state, client) = common::logged_in().await;
    state.script_statuses(&["COMPLETED"]);

    let report = client
        .documents()
        .await_status("doc-4", Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(report.document_id, "doc-4");
    assert!(report.status.is_terminal());
}

#[tokio::test]
async fn test_board_tracks_several_jobs() {
    let (state, client) = common::logged_in().await;
    state.script_statuses(&["COMPLETED"]);

    let board = client.job_board();
    board.track(DocumentView::new("a", JobStatus::Processing));
    board.track(DocumentView::new("b", JobStatus::Processing));

    assert!(common::eventually(Duration::from_secs(5), || board.active_count() == 0).await);
    assert!(board.views().iter().all(|v| v.status == JobStatus::Completed));
}
