//! Single-flight token refresh.
//!
//! # Responsibilities
//! - Turn a 401 on a first attempt into exactly one refresh per episode
//! - Queue every request that hits a 401 while the refresh is running
//! - Replay queued requests in arrival order once new tokens are stored
//! - On refresh failure reject the whole queue and terminate the session once
//!
//! # Design Decisions
//! - The refresh episode runs on its own task so a caller that gives up
//!   does not strand the rest of the queue
//! - Queue and in-flight flag share one lock; it is never held across an await
//! - A request that was sent with a token older than the one now stored is
//!   replayed directly; another caller already refreshed

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::error::{ApiError, ApiResult};
use crate::gateway::{dispatch, ApiRequest, ApiResponse, Transport};
use crate::observability::metrics;
use crate::session::store::CredentialStore;
use crate::session::types::{RefreshRequest, RefreshResponse, TokenPair};

pub const REFRESH_PATH: &str = "/auth/refresh";

struct PendingRequest {
    request: ApiRequest,
    reply: oneshot::Sender<ApiResult<ApiResponse>>,
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    pending: VecDeque<PendingRequest>,
}

struct Inner {
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    state: Mutex<RefreshState>,
}

enum Admission {
    Queued,
    StartEpisode,
    ReplayNow(ApiRequest),
}

/// Coordinates refresh and replay for the whole client.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(store: Arc<CredentialStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                transport,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Access token to attach to the next outbound request.
    pub fn current_token(&self) -> Option<String> {
        self.inner.store.access_token()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_state().in_flight
    }

    /// Number of requests waiting on the running refresh.
    pub fn queued(&self) -> usize {
        self.lock_state().pending.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle a 401 for `request`, which was sent with `sent_with`.
    ///
    /// Resolves with the replay's outcome, `SessionTerminated` when the
    /// refresh fails, or `AuthExpired` when `request` is already a replay.
    pub async fn on_unauthorized(
        &self,
        request: ApiRequest,
        sent_with: Option<String>,
    ) -> ApiResult<ApiResponse> {
        if request.is_retry() {
            tracing::warn!(
                request_id = %request.id(),
                path = %request.path(),
                "Replayed request rejected again"
            );
            return Err(ApiError::AuthExpired);
        }

        let (reply, rx) = oneshot::channel();
        let admission = {
            let mut state = self.lock_state();
            if state.in_flight {
                state.pending.push_back(PendingRequest { request, reply });
                tracing::debug!(queued = state.pending.len(), "Refresh in flight, request queued");
                Admission::Queued
            } else {
                let current = self.inner.store.access_token();
                if current.is_some() && current != sent_with {
                    Admission::ReplayNow(request)
                } else {
                    state.in_flight = true;
                    state.pending.push_back(PendingRequest { request, reply });
                    Admission::StartEpisode
                }
            }
        };

        match admission {
            Admission::ReplayNow(request) => {
                tracing::debug!(request_id = %request.id(), "Token already rotated, replaying");
                return self.replay(request.retried()).await;
            }
            Admission::StartEpisode => {
                let manager = self.clone();
                tokio::spawn(async move { manager.run_episode().await });
            }
            Admission::Queued => {}
        }

        rx.await
            .unwrap_or_else(|_| Err(ApiError::Transport("session refresh interrupted".into())))
    }

    async fn run_episode(&self) {
        tracing::info!("Refreshing access token");

        match self.refresh_tokens().await {
            Ok(()) => {
                metrics::record_refresh(true);
                tracing::info!(queued = self.queued(), "Access token refreshed, replaying");
                self.drain_queue().await;
            }
            Err(e) => {
                metrics::record_refresh(false);
                tracing::warn!(error = %e, "Token refresh failed");
                self.reject_queue();
            }
        }
    }

    async fn refresh_tokens(&self) -> ApiResult<()> {
        let refresh_token = self
            .inner
            .store
            .refresh_token()
            .ok_or_else(|| ApiError::Validation("no refresh token available".into()))?;

        let request = ApiRequest::post(REFRESH_PATH)
            .without_auth()
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })?;
        let response = dispatch(self.inner.transport.as_ref(), &request, None).await?;
        let body: RefreshResponse = response.json()?;

        self.inner.store.replace_tokens(TokenPair {
            access_token: body.access_token,
            refresh_token: body.refresh_token.unwrap_or(refresh_token),
        });
        Ok(())
    }

    /// Replay queued requests one by one, oldest first. Requests arriving
    /// during the drain are picked up before the episode closes.
    async fn drain_queue(&self) {
        loop {
            let next = {
                let mut state = self.lock_state();
                match state.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        state.in_flight = false;
                        return;
                    }
                }
            };
            let result = self.replay(next.request.retried()).await;
            let _ = next.reply.send(result);
        }
    }

    fn reject_queue(&self) {
        let rejected = std::mem::take(&mut self.lock_state().pending);
        self.inner.store.terminate();

        // Late arrivals queued while terminating belong to this episode too.
        let late = {
            let mut state = self.lock_state();
            state.in_flight = false;
            std::mem::take(&mut state.pending)
        };

        let count = rejected.len() + late.len();
        for pending in rejected.into_iter().chain(late) {
            let _ = pending.reply.send(Err(ApiError::SessionTerminated));
        }
        tracing::warn!(rejected = count, "Queued requests rejected, session terminated");
    }

    async fn replay(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let token = self.inner.store.access_token();
        tracing::debug!(
            request_id = %request.id(),
            path = %request.path(),
            attempt = request.attempt(),
            "Replaying request"
        );
        dispatch(self.inner.transport.as_ref(), &request, token.as_deref()).await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedTransport;
    use crate::gateway::Gateway;
    use crate::session::store::MemoryStore;
    use crate::session::types::{SessionEvent, UserProfile};
    use futures_util::future::join_all;
    use std::time::Duration;

    fn logged_in_store() -> Arc<CredentialStore> {
        let store = Arc::new(CredentialStore::init(Arc::new(MemoryStore::new())));
        store.establish(
            TokenPair {
                access_token: "stale".into(),
                refresh_token: "r1".into(),
            },
            UserProfile {
                email: "ana@example.com".into(),
                roles: Default::default(),
            },
        );
        store
    }

    /// Backend that accepts only `fresh` and refreshes according to `refresh_ok`.
    fn backend(refresh_ok: bool) -> ScriptedTransport {
        ScriptedTransport::new(Box::new(move |req, token| {
            if req.path() == REFRESH_PATH {
                return if refresh_ok {
                    Ok(ApiResponse::new(200, r#"{"accessToken":"fresh","refreshToken":"r2"}"#))
                } else {
                    Ok(ApiResponse::new(401, r#"{"error":"refresh token expired"}"#))
                };
            }
            if token == Some("fresh") {
                Ok(ApiResponse::new(200, format!(r#"{{"path":"{}"}}"#, req.path())))
            } else {
                Ok(ApiResponse::new(401, ""))
            }
        }))
        .with_delay(Duration::from_millis(50))
    }

    fn setup(refresh_ok: bool) -> (Arc<ScriptedTransport>, Arc<CredentialStore>, Gateway) {
        let transport = Arc::new(backend(refresh_ok));
        let store = logged_in_store();
        let session = SessionManager::new(store.clone(), transport.clone());
        (transport.clone(), store, Gateway::new(transport, session))
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let (transport, store, gw) = setup(true);

        let calls = (0..5).map(|i| gw.execute(ApiRequest::get(format!("/r/{i}"))));
        let results = join_all(calls).await;

        for (i, result) in results.into_iter().enumerate() {
            let value: serde_json::Value = result.unwrap().json().unwrap();
            assert_eq!(value["path"], format!("/r/{i}"));
        }
        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
        assert_eq!(store.access_token().as_deref(), Some("fresh"));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
        assert!(!gw.session().is_refreshing());
    }

    #[tokio::test]
    async fn test_replay_order_is_fifo() {
        let (transport, _store, gw) = setup(true);

        let calls = (0..4).map(|i| gw.execute(ApiRequest::get(format!("/r/{i}"))));
        join_all(calls).await;

        let replayed: Vec<String> = transport
            .sent()
            .into_iter()
            .filter(|(req, _)| req.is_retry())
            .map(|(req, _)| req.path().to_string())
            .collect();
        assert_eq!(replayed, vec!["/r/0", "/r/1", "/r/2", "/r/3"]);
    }

    #[tokio::test]
    async fn test_replay_preserves_request_identity() {
        let (transport, _store, gw) = setup(true);

        let request = ApiRequest::post("/documents/async/d1/webhook/register")
            .query("webhookUrl", "https://hooks.example.com/a")
            .json(&serde_json::json!({"webhookUrl": "https://hooks.example.com/a"}))
            .unwrap();
        let id = request.id();
        gw.execute(request).await.unwrap();

        let attempts: Vec<_> = transport
            .sent()
            .into_iter()
            .filter(|(req, _)| req.id() == id)
            .collect();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].1.as_deref(), Some("stale"));
        assert_eq!(attempts[1].1.as_deref(), Some("fresh"));
        assert_eq!(attempts[0].0.query_pairs(), attempts[1].0.query_pairs());
        assert!(matches!(attempts[1].0.body(), crate::gateway::RequestBody::Json(_)));
    }

    #[tokio::test]
    async fn test_failed_refresh_terminates_once() {
        let (transport, store, gw) = setup(false);
        let mut events = store.subscribe();

        let calls = (0..6).map(|i| gw.execute(ApiRequest::get(format!("/r/{i}"))));
        let results = join_all(calls).await;

        assert!(results.iter().all(|r| r == &Err(ApiError::SessionTerminated)));
        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
        assert!(!store.is_authenticated());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Terminated);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_terminates() {
        let transport = Arc::new(backend(true));
        let store = Arc::new(CredentialStore::init(Arc::new(MemoryStore::new())));
        let mut events = store.subscribe();
        let manager = SessionManager::new(store.clone(), transport.clone());
        let gw = Gateway::new(transport.clone(), manager.clone());

        let err = gw.execute(ApiRequest::get("/auth/me")).await.unwrap_err();
        assert_eq!(err, ApiError::SessionTerminated);
        assert_eq!(transport.calls_to(REFRESH_PATH), 0);
        assert!(!manager.is_refreshing());

        // No session existed, so there is nothing to announce; callers still
        // see SessionTerminated.
        assert!(events.try_recv().is_err());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_replay_rejected_again_is_auth_expired() {
        let transport = Arc::new(
            ScriptedTransport::new(Box::new(|req, _| {
                if req.path() == REFRESH_PATH {
                    Ok(ApiResponse::new(200, r#"{"token":"fresh"}"#))
                } else {
                    Ok(ApiResponse::new(401, ""))
                }
            })),
        );
        let store = logged_in_store();
        let gw = Gateway::new(transport.clone(), SessionManager::new(store.clone(), transport.clone()));

        let err = gw.execute(ApiRequest::get("/admin/only")).await.unwrap_err();
        assert_eq!(err, ApiError::AuthExpired);
        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
        // Refresh token was not rotated by the backend, so it is kept.
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_stale_token_replays_without_refresh() {
        let (transport, store, gw) = setup(true);
        store.replace_tokens(TokenPair {
            access_token: "fresh".into(),
            refresh_token: "r2".into(),
        });

        let response = gw
            .session()
            .on_unauthorized(ApiRequest::get("/r/late"), Some("stale".into()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls_to(REFRESH_PATH), 0);
    }
}
