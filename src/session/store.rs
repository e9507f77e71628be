//! Credential storage.
//!
//! # Responsibilities
//! - Hold the current session snapshot (token pair + user)
//! - Persist it through an opaque key-value backend under fixed key names
//! - Broadcast session lifecycle events (login, refresh, logout, termination)
//!
//! # Design Decisions
//! - Readers get a lock-free snapshot (`ArcSwap`); only the session manager
//!   and explicit login/logout write
//! - The token pair is stored and cleared as a unit; a half-present pair found
//!   at startup is discarded
//! - Persistence failures are logged, never fatal: the in-memory session is the
//!   source of truth for the running process

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::session::types::{Session, SessionEvent, TokenPair, UserProfile};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Opaque persisted key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.inner.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }
}

/// JSON-file backed store. Every mutation rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: DashMap<String, String>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = DashMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            if !content.trim().is_empty() {
                let map: BTreeMap<String, String> = serde_json::from_str(&content)?;
                for (k, v) in map {
                    inner.insert(k, v);
                }
            }
            tracing::debug!(path = ?path, entries = inner.len(), "Loaded credential file");
        }

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    fn persist(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let map: BTreeMap<String, String> = self
            .inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let result = serde_json::to_string_pretty(&map)
            .map_err(std::io::Error::from)
            .and_then(|json| {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                fs::write(&self.path, json)
            });

        if let Err(e) = result {
            tracing::warn!(path = ?self.path, error = %e, "Failed to persist credentials");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.inner.insert(key.to_string(), value.to_string());
        self.persist();
    }

    fn remove(&self, key: &str) {
        if self.inner.remove(key).is_some() {
            self.persist();
        }
    }
}

/// Owner of the session. The only mutable state shared across the client.
pub struct CredentialStore {
    session: ArcSwap<Session>,
    backend: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl CredentialStore {
    /// Create a store and load whatever session the backend holds.
    pub fn init(backend: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        let store = Self {
            session: ArcSwap::from_pointee(Session::anonymous()),
            backend,
            events,
        };
        store.load_persisted();
        store
    }

    fn load_persisted(&self) {
        let access = self.backend.get(ACCESS_TOKEN_KEY);
        let refresh = self.backend.get(REFRESH_TOKEN_KEY);
        let user_raw = self.backend.get(USER_KEY);

        let user = match user_raw.as_deref().map(serde_json::from_str::<UserProfile>) {
            None => None,
            Some(Ok(user)) => Some(user),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted user");
                self.wipe_backend();
                return;
            }
        };

        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => {
                let tokens = TokenPair {
                    access_token,
                    refresh_token,
                };
                self.session
                    .store(Arc::new(Session::authenticated(tokens, user)));
                tracing::debug!("Restored persisted session");
            }
            (None, None) => {
                if user.is_some() {
                    self.backend.remove(USER_KEY);
                }
            }
            _ => {
                tracing::warn!("Discarding half-present persisted token pair");
                self.wipe_backend();
            }
        }
    }

    fn wipe_backend(&self) {
        self.backend.remove(ACCESS_TOKEN_KEY);
        self.backend.remove(REFRESH_TOKEN_KEY);
        self.backend.remove(USER_KEY);
    }

    fn persist(&self, session: &Session) {
        match session.tokens() {
            Some(tokens) => {
                self.backend.set(ACCESS_TOKEN_KEY, &tokens.access_token);
                self.backend.set(REFRESH_TOKEN_KEY, &tokens.refresh_token);
            }
            None => {
                self.backend.remove(ACCESS_TOKEN_KEY);
                self.backend.remove(REFRESH_TOKEN_KEY);
            }
        }
        match session.user().map(serde_json::to_string) {
            Some(Ok(json)) => self.backend.set(USER_KEY, &json),
            Some(Err(e)) => tracing::warn!(error = %e, "Failed to encode user"),
            None => self.backend.remove(USER_KEY),
        }
    }

    pub fn snapshot(&self) -> Arc<Session> {
        self.session.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.load().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.session.load().access_token().map(str::to_string)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.session.load().refresh_token().map(str::to_string)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.session.load().user().cloned()
    }

    /// Install a fresh session after login.
    pub fn establish(&self, tokens: TokenPair, user: UserProfile) {
        let session = Session::authenticated(tokens, Some(user));
        self.persist(&session);
        self.session.store(Arc::new(session));
        let _ = self.events.send(SessionEvent::LoggedIn);
    }

    /// Swap the token pair after a successful refresh, keeping the user.
    pub fn replace_tokens(&self, tokens: TokenPair) {
        let session = self.session.load().with_tokens(tokens);
        self.persist(&session);
        self.session.store(Arc::new(session));
        let _ = self.events.send(SessionEvent::Refreshed);
    }

    /// Voluntary logout.
    pub fn clear(&self) {
        self.session.store(Arc::new(Session::anonymous()));
        self.wipe_backend();
        let _ = self.events.send(SessionEvent::LoggedOut);
    }

    /// Forced logout after a failed refresh.
    ///
    /// Emits [`SessionEvent::Terminated`] only when a session was actually
    /// dropped, so concurrent stragglers after termination stay silent.
    pub fn terminate(&self) -> bool {
        let previous = self.session.swap(Arc::new(Session::anonymous()));
        self.wipe_backend();
        if !previous.is_authenticated() {
            return false;
        }
        metrics::record_session_terminated();
        tracing::warn!("Session terminated");
        let _ = self.events.send(SessionEvent::Terminated);
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
