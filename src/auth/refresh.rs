//! Silent access-token refresh
//!
//! The refresh call goes straight to the transport. It never passes
//! through the request pipeline, so it can never trigger a refresh of its
//! own.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::session::{InvalidationReason, SessionInvalidated, SessionListener};
use crate::auth::store::TokenStore;
use crate::auth::token::TokenKey;
use crate::error::AuthError;
use crate::http::client::HttpClient;
use crate::http::request::{PendingRequest, RequestDescriptor};

/// How concurrent 401s coordinate their refresh calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Concurrent refreshes share one in-flight call
    #[default]
    SingleFlight,
    /// Every 401 issues its own refresh call
    Independent,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, AuthError>>>;

/// The request that hit the 401, kept for logging and the invalidation event
#[derive(Debug, Clone)]
struct Origin {
    request_id: Uuid,
    method: Method,
    path: String,
}

impl Origin {
    fn of(request: &PendingRequest) -> Self {
        Self {
            request_id: request.id(),
            method: request.method().clone(),
            path: request.path().to_string(),
        }
    }
}

/// Exchanges the stored refresh token for a new access token
pub struct TokenRefresher {
    transport: Arc<dyn HttpClient>,
    store: Arc<dyn TokenStore>,
    listener: Arc<dyn SessionListener>,
    refresh_path: String,
    mode: RefreshMode,
    redirect_on_public_read: bool,
    in_flight: Mutex<Option<RefreshFuture>>,
}

impl fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("refresh_path", &self.refresh_path)
            .field("mode", &self.mode)
            .field("redirect_on_public_read", &self.redirect_on_public_read)
            .field("in_flight", &self.in_flight.lock().is_some())
            .finish()
    }
}

impl TokenRefresher {
    pub fn new(
        transport: Arc<dyn HttpClient>,
        store: Arc<dyn TokenStore>,
        listener: Arc<dyn SessionListener>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            listener,
            refresh_path: refresh_path.into(),
            mode: RefreshMode::default(),
            redirect_on_public_read: false,
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_redirect_on_public_read(mut self, redirect: bool) -> Self {
        self.redirect_on_public_read = redirect;
        self
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    /// Obtain a fresh access token on behalf of `request`
    ///
    /// On failure both tokens are cleared and the session listener is
    /// notified before the error is returned.
    pub async fn refresh(self: &Arc<Self>, request: &PendingRequest) -> Result<String, AuthError> {
        let origin = Origin::of(request);

        let refresh_token = match self.store.get(TokenKey::Refresh) {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!(request_id = %origin.request_id, path = %origin.path, "401 without a refresh token");
                self.invalidate(&origin, InvalidationReason::NoRefreshToken);
                return Err(AuthError::NoRefreshToken);
            }
            Err(e) => {
                let reason = format!("failed to read refresh token: {}", e);
                error!(request_id = %origin.request_id, error = %e, "Token store read failed");
                self.invalidate(
                    &origin,
                    InvalidationReason::RefreshFailed {
                        reason: reason.clone(),
                    },
                );
                return Err(AuthError::RefreshFailed { reason });
            }
        };

        match self.mode {
            RefreshMode::Independent => {
                Arc::clone(self).exchange(refresh_token, origin).await
            }
            RefreshMode::SingleFlight => {
                let shared = {
                    let mut slot = self.in_flight.lock();
                    match slot.as_ref() {
                        Some(existing) => {
                            debug!(request_id = %origin.request_id, "Joining in-flight refresh");
                            existing.clone()
                        }
                        None => {
                            let fresh = Arc::clone(self)
                                .exchange(refresh_token, origin)
                                .boxed()
                                .shared();
                            *slot = Some(fresh.clone());
                            fresh
                        }
                    }
                };

                let result = shared.clone().await;

                let mut slot = self.in_flight.lock();
                if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
                    *slot = None;
                }
                result
            }
        }
    }

    async fn exchange(self: Arc<Self>, refresh_token: String, origin: Origin) -> Result<String, AuthError> {
        info!(request_id = %origin.request_id, path = %origin.path, "Refreshing access token");

        let request = PendingRequest::new(
            RequestDescriptor::post(self.refresh_path.clone())
                .json_value(json!({ "refresh": refresh_token }))
                .without_refresh(),
        );

        let outcome = match self.transport.send(&request).await {
            Err(e) => Err(format!("refresh request failed: {}", e)),
            Ok(response) if !response.is_success() => {
                Err(format!("refresh endpoint returned {}", response.status))
            }
            Ok(response) => match response.json::<RefreshResponse>() {
                Ok(body) if body.access.is_empty() => {
                    Err("refresh endpoint returned an empty access token".to_string())
                }
                Ok(body) => self
                    .store
                    .store_access(&body.access)
                    .map(|()| body.access)
                    .map_err(|e| format!("failed to store access token: {}", e)),
                Err(e) => Err(format!("invalid refresh response: {}", e)),
            },
        };

        match outcome {
            Ok(access) => {
                info!(request_id = %origin.request_id, "Access token refreshed");
                Ok(access)
            }
            Err(reason) => {
                warn!(request_id = %origin.request_id, reason = %reason, "Token refresh failed");
                self.invalidate(
                    &origin,
                    InvalidationReason::RefreshFailed {
                        reason: reason.clone(),
                    },
                );
                Err(AuthError::RefreshFailed { reason })
            }
        }
    }

    fn invalidate(&self, origin: &Origin, reason: InvalidationReason) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear credentials after refresh failure");
        }
        let event = SessionInvalidated::new(
            reason,
            &origin.method,
            &origin.path,
            self.redirect_on_public_read,
        );
        self.listener.session_invalidated(&event);
    }
}
