//! Session refresh and replay against a live mock backend.

use futures_util::future::join_all;
use std::sync::atomic::Ordering;
use std::time::Duration;

use docflow_client::session::SessionEvent;
use docflow_client::ApiError;

mod common;

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    let (state, client) = common::logged_in().await;
    state.expire_access_token();

    let me = client.auth().me().await.unwrap();
    assert_eq!(me["email"], "ana@example.com");
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.store().access_token().as_deref(), Some("access-2"));
    assert_eq!(client.store().refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn test_concurrent_expired_requests_share_one_refresh() {
    let (state, client) = common::logged_in().await;
    state.refresh_delay_ms.store(200, Ordering::SeqCst);
    state.expire_access_token();

    let auth = client.auth();
    let results = join_all((0..10).map(|_| auth.me())).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!client.gateway().session().is_refreshing());
}

#[tokio::test]
async fn test_failed_refresh_terminates_session_once() {
    let (state, client) = common::logged_in().await;
    let mut events = client.session_events();
    state.refresh_fails.store(true, Ordering::SeqCst);
    state.refresh_delay_ms.store(100, Ordering::SeqCst);
    state.expire_access_token();

    let auth = client.auth();
    let results = join_all((0..5).map(|_| auth.me())).await;

    for result in &results {
        assert_eq!(result.as_ref().unwrap_err(), &ApiError::SessionTerminated);
    }
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!client.store().is_authenticated());

    let mut terminated = 0;
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::Terminated {
            terminated += 1;
        }
    }
    assert_eq!(terminated, 1);
}

#[tokio::test]
async fn test_wrong_password_is_not_refreshed() {
    let (state, base_url) = common::start_mock_api().await;
    let client = common::client_for(&base_url);

    let err = client.auth().login("ana", "guess").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Server {
            status: 401,
            message: "Invalid credentials".into()
        }
    );
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(!client.auth().is_authenticated());
}

#[tokio::test]
async fn test_webhook_registration_replays_once_after_refresh() {
    let (state, client) = common::logged_in().await;
    state.expire_access_token();

    let ack = client
        .documents()
        .register_webhook("doc-7", "https://hooks.example.com/done")
        .await
        .unwrap();

    assert_eq!(ack.webhook_url.as_deref(), Some("https://hooks.example.com/done"));
    assert_eq!(
        state.webhook_urls.lock().unwrap().as_slice(),
        ["https://hooks.example.com/done".to_string()]
    );
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_logout_then_request_ends_session_quietly() {
    let (state, client) = common::logged_in().await;
    client.auth().logout().await.unwrap();
    let mut events = client.session_events();

    let err = tokio::time::timeout(Duration::from_secs(5), client.auth().me())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err, ApiError::SessionTerminated);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(events.try_recv().is_err());
}
