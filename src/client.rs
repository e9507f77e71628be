//! Client facade.
//!
//! Wires configuration, credential storage, the session manager and the
//! gateway together, and hands out the typed APIs and trackers.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::api::{AuthApi, DashboardApi, DocumentView, DocumentsApi};
use crate::breaker::BreakerMonitor;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{Gateway, HttpTransport, Transport};
use crate::jobs::{JobBoard, JobTracker};
use crate::resilience::TimeoutPolicy;
use crate::session::{CredentialStore, FileStore, KeyValueStore, MemoryStore, SessionEvent, SessionManager};

#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    store: Arc<CredentialStore>,
    gateway: Gateway,
    timeouts: TimeoutPolicy,
}

impl ApiClient {
    /// Build a client over HTTP, persisting credentials where configured.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let backend: Arc<dyn KeyValueStore> = match &config.credentials.path {
            Some(path) => Arc::new(FileStore::open(path).map_err(|e| {
                ApiError::Validation(format!("cannot open credential file {path}: {e}"))
            })?),
            None => Arc::new(MemoryStore::new()),
        };
        let timeouts = TimeoutPolicy::new(&config.timeouts);
        let transport = Arc::new(HttpTransport::new(&config.api, timeouts)?);
        Ok(Self::with_parts(config, transport, backend))
    }

    /// Build a client over an arbitrary transport and storage backend.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn KeyValueStore>,
    ) -> Self {
        let store = Arc::new(CredentialStore::init(backend));
        let session = SessionManager::new(store.clone(), transport.clone());
        let gateway = Gateway::new(transport, session);
        let timeouts = TimeoutPolicy::new(&config.timeouts);

        tracing::debug!(
            base_url = %config.api.base_url,
            authenticated = store.is_authenticated(),
            "Client initialized"
        );

        Self {
            config: Arc::new(config),
            store,
            gateway,
            timeouts,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.gateway.clone(), self.store.clone())
    }

    pub fn documents(&self) -> DocumentsApi {
        DocumentsApi::new(self.gateway.clone(), self.config.upload.clone(), self.timeouts)
    }

    pub fn dashboard(&self) -> DashboardApi {
        DashboardApi::new(self.gateway.clone())
    }

    /// Poll `view` until its job finishes, at the configured job interval.
    pub fn track_job(&self, view: DocumentView) -> JobTracker {
        JobTracker::watch(self.documents(), view, self.config.polling.job_interval())
    }

    pub fn job_board(&self) -> JobBoard {
        JobBoard::new(self.documents(), self.config.polling.job_interval())
    }

    pub fn breaker_monitor(&self) -> BreakerMonitor {
        BreakerMonitor::start(self.dashboard(), self.config.polling.breaker_interval())
    }

    /// Session lifecycle events, including the one-time `Terminated`.
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.api.base_url)
            .field("store", &self.store)
            .finish()
    }
}
