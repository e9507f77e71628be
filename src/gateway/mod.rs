//! Request gateway.
//!
//! # Data Flow
//! ```text
//! Typed API call
//!     → ApiRequest (request.rs)
//!     → Gateway::execute: attach current access token
//!     → Transport::send (transport.rs)
//!     → classify: 2xx ok / 401 auth expired / other status passed through
//!     → 401 on a first attempt → SessionManager (refresh, queue, replay)
//! ```
//!
//! # Design Decisions
//! - The transport never interprets status codes; classification lives here
//! - A replayed request that is rejected again surfaces as `AuthExpired`
//!   without another refresh
//! - Non-auth failures reach the caller unchanged

pub mod request;
pub mod transport;

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::session::SessionManager;

pub use request::{ApiRequest, ApiResponse, FilePart, RequestBody, REQUEST_ID_HEADER};
pub use transport::{HttpTransport, Transport};

/// Send one attempt and classify the outcome. No refresh handling.
pub(crate) async fn dispatch(
    transport: &dyn Transport,
    request: &ApiRequest,
    access_token: Option<&str>,
) -> ApiResult<ApiResponse> {
    let response = transport.send(request, access_token).await?;

    if response.is_success() {
        return Ok(response);
    }
    if response.status == 401 && request.is_authenticated() {
        return Err(ApiError::AuthExpired);
    }
    Err(ApiError::Server {
        status: response.status,
        message: response.error_message(),
    })
}

/// Entry point for every authenticated call.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    session: SessionManager,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, session: SessionManager) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Execute a request, transparently refreshing the session on a 401.
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        if !request.is_authenticated() {
            return dispatch(self.transport.as_ref(), &request, None).await;
        }

        let token = self.session.current_token();
        match dispatch(self.transport.as_ref(), &request, token.as_deref()).await {
            Err(ApiError::AuthExpired) => self.session.on_unauthorized(request, token).await,
            other => other,
        }
    }

    /// Execute and decode the JSON body.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        self.execute(request).await?.json()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}
