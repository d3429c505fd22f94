//! Session lifecycle on top of the token store
//!
//! Only this service and the refresher write credentials: login and
//! registration store both tokens, refresh replaces the access token,
//! logout and unrecoverable failures clear both.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::accounts::{LoginRequest, RegisterRequest, User};
use crate::api::ApiClient;
use crate::auth::store::TokenStore;
use crate::auth::token::{AccessClaims, CredentialPair, TokenKey};
use crate::config::AuthConfig;
use crate::error::HttpResult;

#[derive(Debug)]
pub struct AuthService {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    login_path: String,
    register_path: String,
    me_path: String,
    user: RwLock<Option<User>>,
}

impl AuthService {
    pub fn new(api: ApiClient, config: &AuthConfig) -> Self {
        let store = Arc::clone(api.http().token_store());
        Self {
            api,
            store,
            login_path: config.login_path.clone(),
            register_path: config.register_path.clone(),
            me_path: config.me_path.clone(),
            user: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Sign in and load the user
    pub async fn login(&self, email: &str, password: &str) -> HttpResult<User> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let pair = self.api.login_at(&self.login_path, &request).await?;
        self.establish(pair.into()).await
    }

    /// Create an account and sign in with the returned tokens
    pub async fn register(&self, request: &RegisterRequest) -> HttpResult<User> {
        let pair = self.api.register_at(&self.register_path, request).await?;
        self.establish(pair.into()).await
    }

    async fn establish(&self, pair: CredentialPair) -> HttpResult<User> {
        self.store.store_pair(&pair)?;
        match self.api.me_at(&self.me_path).await {
            Ok(user) => {
                info!(user_id = user.id, "Signed in");
                *self.user.write() = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Could not load the signed-in user");
                self.store.clear()?;
                Err(e)
            }
        }
    }

    pub fn logout(&self) -> HttpResult<()> {
        self.store.clear()?;
        *self.user.write() = None;
        info!("Signed out");
        Ok(())
    }

    /// Rebuild the session from stored tokens at startup
    ///
    /// Any failure to load the user drops the stored credentials.
    pub async fn restore(&self) -> HttpResult<Option<User>> {
        if self.store.get(TokenKey::Access)?.is_none() {
            *self.user.write() = None;
            return Ok(None);
        }

        match self.api.me_at(&self.me_path).await {
            Ok(user) => {
                info!(user_id = user.id, "Session restored");
                *self.user.write() = Some(user.clone());
                Ok(Some(user))
            }
            Err(e) => {
                warn!(error = %e, "Stored session is no longer valid");
                self.store.clear()?;
                *self.user.write() = None;
                Ok(None)
            }
        }
    }

    /// The signed-in user, or `None` once the credentials are gone
    pub fn current_user(&self) -> Option<User> {
        match self.store.has_tokens() {
            Ok(true) => self.user.read().clone(),
            _ => None,
        }
    }

    /// Role codes from the access token, falling back to the loaded user
    pub fn roles(&self) -> Vec<String> {
        let from_token = self
            .store
            .get(TokenKey::Access)
            .ok()
            .flatten()
            .and_then(|token| AccessClaims::decode(&token))
            .map(|claims| claims.roles)
            .unwrap_or_default();
        if !from_token.is_empty() {
            return from_token;
        }
        self.current_user().map(|u| u.roles).unwrap_or_default()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}
