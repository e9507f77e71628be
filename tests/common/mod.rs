//! Shared utilities for integration tests: an in-process mock of the document API.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use docflow_client::{ApiClient, ClientConfig};

type Reply = (StatusCode, Json<Value>);

/// Programmable backend state. Tokens are `access-N` / `refresh-N`.
#[derive(Default)]
pub struct MockBackend {
    access_token: Mutex<String>,
    refresh_token: Mutex<String>,
    generation: AtomicU64,
    statuses: Mutex<VecDeque<String>>,
    breaker: Mutex<Value>,
    pub refresh_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub status_probes: AtomicUsize,
    pub breaker_polls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    pub webhook_urls: Mutex<Vec<String>>,
}

impl MockBackend {
    fn issue_tokens(&self) -> (String, String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{generation}");
        let refresh = format!("refresh-{generation}");
        *self.access_token.lock().unwrap() = access.clone();
        *self.refresh_token.lock().unwrap() = refresh.clone();
        (access, refresh)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token.lock().unwrap());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    /// Invalidate the access token the client holds; its refresh token stays valid.
    pub fn expire_access_token(&self) {
        *self.access_token.lock().unwrap() = "expired".into();
    }

    /// Status sequence for job probes. The last entry repeats.
    pub fn script_statuses(&self, statuses: &[&str]) {
        *self.statuses.lock().unwrap() = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_breaker(&self, value: Value) {
        *self.breaker.lock().unwrap() = value;
    }

    fn next_status(&self) -> String {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or_default()
        } else {
            statuses.front().cloned().unwrap_or_else(|| "PROCESSING".into())
        }
    }
}

fn unauthorized() -> Reply {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})))
}

async fn login(State(state): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Reply {
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if body["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid credentials"})));
    }
    let roles = if username == "admin" { json!(["ADMIN", "USER"]) } else { json!(["USER"]) };
    let (access, refresh) = state.issue_tokens();
    (
        StatusCode::OK,
        Json(json!({
            "token": access,
            "refreshToken": refresh,
            "type": "Bearer",
            "email": format!("{username}@example.com"),
            "roles": roles,
            "expiresIn": 900
        })),
    )
}

async fn refresh(State(state): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Reply {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let valid = *state.refresh_token.lock().unwrap() == presented;
    if state.refresh_fails.load(Ordering::SeqCst) || !valid {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid refresh token"})));
    }

    let (access, refresh) = state.issue_tokens();
    (StatusCode::OK, Json(json!({"accessToken": access, "refreshToken": refresh})))
}

async fn logout(State(state): State<Arc<MockBackend>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({"message": "Logged out"})))
}

async fn me(State(state): State<Arc<MockBackend>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({"email": "ana@example.com", "roles": ["USER"]})))
}

async fn status(
    State(state): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.status_probes.fetch_add(1, Ordering::SeqCst);
    let status = state.next_status();
    (
        StatusCode::OK,
        Json(json!({"documentId": id, "status": status, "timestamp": 1_760_000_000_000i64})),
    )
}

async fn register_webhook(
    State(state): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let url = query.get("webhookUrl").cloned().unwrap_or_default();
    state.webhook_urls.lock().unwrap().push(url.clone());
    (
        StatusCode::OK,
        Json(json!({"documentId": id, "webhookUrl": url, "message": "Webhook registered successfully"})),
    )
}

async fn unregister_webhook(
    State(state): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({"message": "Webhook unregistered"})))
}

async fn breaker_status(State(state): State<Arc<MockBackend>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.breaker_polls.fetch_add(1, Ordering::SeqCst);
    let breaker = state.breaker.lock().unwrap().clone();
    (StatusCode::OK, Json(breaker))
}

async fn breaker_reset(State(state): State<Arc<MockBackend>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.reset_calls.fetch_add(1, Ordering::SeqCst);
    state.set_breaker(json!({
        "state": "CLOSED",
        "successCount": 0,
        "failureCount": 0,
        "failureThreshold": 50
    }));
    (StatusCode::OK, Json(json!({"message": "Circuit breaker reset successfully"})))
}

/// Start the mock on an ephemeral port. Returns its state and the API base URL.
pub async fn start_mock_api() -> (Arc<MockBackend>, String) {
    let state = Arc::new(MockBackend::default());
    state.set_breaker(json!({
        "state": "CLOSED",
        "successCount": 0,
        "failureCount": 0,
        "failureThreshold": 50
    }));

    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/documents/async/{id}/status", get(status))
        .route("/api/documents/async/{id}/status/polling", get(status))
        .route("/api/documents/async/{id}/webhook/register", post(register_webhook))
        .route("/api/documents/async/{id}/webhook", delete(unregister_webhook))
        .route("/api/documents/async/dashboard/circuit-breaker/status", get(breaker_status))
        .route("/api/documents/async/dashboard/circuit-breaker/reset", post(breaker_reset))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (state, format!("http://{addr}/api"))
}

/// Client against `base_url` with short polling intervals.
pub fn client_for(base_url: &str) -> ApiClient {
    let mut config = ClientConfig::default();
    config.api.base_url = base_url.to_string();
    config.timeouts.default_ms = 5_000;
    config.polling.job_interval_ms = 100;
    config.polling.breaker_interval_ms = 300;
    ApiClient::new(config).unwrap()
}

/// Logged-in client against a fresh mock.
pub async fn logged_in() -> (Arc<MockBackend>, ApiClient) {
    let (state, base_url) = start_mock_api().await;
    let client = client_for(&base_url);
    client.auth().login("ana", "secret").await.unwrap();
    (state, client)
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
