//! Authentication endpoints.

use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::gateway::{ApiRequest, Gateway};
use crate::session::types::{LoginRequest, LoginResponse};
use crate::session::{CredentialStore, TokenPair, UserProfile};

pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Debug, Clone)]
pub struct AuthApi {
    gateway: Gateway,
    store: Arc<CredentialStore>,
}

impl AuthApi {
    pub fn new(gateway: Gateway, store: Arc<CredentialStore>) -> Self {
        Self { gateway, store }
    }

    /// Exchange credentials for a token pair and store the session.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<UserProfile> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::Validation("username and password are required".into()));
        }

        let request = ApiRequest::post("/auth/login")
            .without_auth()
            .json(&LoginRequest { username, password })?;
        let login: LoginResponse = self.gateway.execute_json(request).await?;

        let user = UserProfile {
            email: login.email,
            roles: login.roles,
        };
        self.store.establish(
            TokenPair {
                access_token: login.token,
                refresh_token: login.refresh_token,
            },
            user.clone(),
        );
        tracing::info!(email = %user.email, roles = user.roles.len(), "Logged in");
        Ok(user)
    }

    /// Log out. The local session is cleared even if the backend call fails.
    pub async fn logout(&self) -> ApiResult<()> {
        if self.store.is_authenticated() {
            if let Err(e) = self.gateway.execute(ApiRequest::post("/auth/logout")).await {
                tracing::warn!(error = %e, "Backend logout failed, clearing local session anyway");
            }
        }
        self.store.clear();
        tracing::info!("Logged out");
        Ok(())
    }

    /// Current user as reported by the backend.
    pub async fn me(&self) -> ApiResult<serde_json::Value> {
        self.gateway.execute_json(ApiRequest::get("/auth/me")).await
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.store.user().is_some_and(|u| u.has_role(ADMIN_ROLE))
    }
}
