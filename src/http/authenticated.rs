//! HTTP client that attaches the access token and recovers from expiry
//!
//! Two stages do the work. [`BearerTokenStage`] reads the access token
//! from the store before every attempt. [`RefreshOnUnauthorizedStage`]
//! turns the first 401 of a request into a refresh plus one retry.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::auth::refresh::{RefreshMode, TokenRefresher};
use crate::auth::session::{LoggingSessionListener, SessionListener};
use crate::auth::store::{MemoryTokenStore, TokenStore};
use crate::auth::token::TokenKey;
use crate::config::Config;
use crate::error::HttpResult;
use crate::http::client::{HttpClient, ReqwestHttpClient};
use crate::http::middleware::{Pipeline, RequestStage, ResponseAction, ResponseStage};
use crate::http::request::{PendingRequest, RequestDescriptor};
use crate::http::response::HttpResponse;

/// Default path of the token refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh/";

/// Attaches `Authorization: Bearer <access>` when an access token is stored
#[derive(Debug)]
pub struct BearerTokenStage {
    store: Arc<dyn TokenStore>,
}

impl BearerTokenStage {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RequestStage for BearerTokenStage {
    async fn on_request(&self, mut request: PendingRequest) -> HttpResult<PendingRequest> {
        // Anonymous requests go out without a header
        if let Some(access) = self.store.get(TokenKey::Access)? {
            request.set_bearer(&access)?;
        }
        Ok(request)
    }
}

/// Refreshes the access token on the first 401 and retries once
#[derive(Debug)]
pub struct RefreshOnUnauthorizedStage {
    refresher: Arc<TokenRefresher>,
}

impl RefreshOnUnauthorizedStage {
    pub fn new(refresher: Arc<TokenRefresher>) -> Self {
        Self { refresher }
    }
}

#[async_trait]
impl ResponseStage for RefreshOnUnauthorizedStage {
    async fn on_response(
        &self,
        request: &PendingRequest,
        response: HttpResponse,
    ) -> HttpResult<ResponseAction> {
        if !response.is_unauthorized() || !request.descriptor().refresh_on_unauthorized {
            return Ok(ResponseAction::Continue(response));
        }

        if request.retried() {
            debug!(
                request_id = %request.id(),
                path = %request.path(),
                "401 after retry, surfacing to caller"
            );
            return Ok(ResponseAction::Continue(response));
        }

        let mut next = request.clone();
        next.mark_retried();

        let access = self.refresher.refresh(request).await?;
        next.set_bearer(&access)?;
        Ok(ResponseAction::Retry(next))
    }
}

/// The client views and API wrappers call into
#[derive(Debug, Clone)]
pub struct AuthenticatedHttpClient {
    pipeline: Pipeline,
    store: Arc<dyn TokenStore>,
    refresher: Arc<TokenRefresher>,
}

impl AuthenticatedHttpClient {
    pub fn builder(transport: Arc<dyn HttpClient>) -> AuthenticatedHttpClientBuilder {
        AuthenticatedHttpClientBuilder::new(transport)
    }

    /// Build a reqwest-backed client from configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn TokenStore>,
        listener: Arc<dyn SessionListener>,
    ) -> HttpResult<Self> {
        let transport = Arc::new(ReqwestHttpClient::from_config(&config.api)?);
        Ok(Self::builder(transport)
            .token_store(store)
            .session_listener(listener)
            .refresh_path(config.auth.refresh_path.clone())
            .refresh_mode(config.auth.refresh_mode)
            .redirect_on_public_read(config.auth.redirect_on_public_read)
            .build())
    }

    /// Send a request and return the final response, whatever its status
    pub async fn send(&self, descriptor: RequestDescriptor) -> HttpResult<HttpResponse> {
        self.pipeline.execute(descriptor).await
    }

    /// Send a request; non-2xx statuses become [`crate::error::HttpError::Status`]
    pub async fn request(&self, descriptor: RequestDescriptor) -> HttpResult<HttpResponse> {
        self.send(descriptor).await?.error_for_status()
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn refresher(&self) -> &Arc<TokenRefresher> {
        &self.refresher
    }
}

/// Builder for [`AuthenticatedHttpClient`]
pub struct AuthenticatedHttpClientBuilder {
    transport: Arc<dyn HttpClient>,
    store: Option<Arc<dyn TokenStore>>,
    listener: Option<Arc<dyn SessionListener>>,
    refresh_path: String,
    mode: RefreshMode,
    redirect_on_public_read: bool,
    request_stages: Vec<Arc<dyn RequestStage>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl AuthenticatedHttpClientBuilder {
    fn new(transport: Arc<dyn HttpClient>) -> Self {
        Self {
            transport,
            store: None,
            listener: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            mode: RefreshMode::default(),
            redirect_on_public_read: false,
            request_stages: Vec::new(),
            response_stages: Vec::new(),
        }
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn redirect_on_public_read(mut self, redirect: bool) -> Self {
        self.redirect_on_public_read = redirect;
        self
    }

    /// Extra request stage, run after the bearer stage
    pub fn request_stage(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.request_stages.push(stage);
        self
    }

    /// Extra response stage, run after the refresh stage
    pub fn response_stage(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    pub fn build(self) -> AuthenticatedHttpClient {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(LoggingSessionListener));

        let refresher = Arc::new(
            TokenRefresher::new(
                Arc::clone(&self.transport),
                Arc::clone(&store),
                listener,
                self.refresh_path,
            )
            .with_mode(self.mode)
            .with_redirect_on_public_read(self.redirect_on_public_read),
        );

        let mut pipeline = Pipeline::new(self.transport)
            .with_request_stage(Arc::new(BearerTokenStage::new(Arc::clone(&store))))
            .with_response_stage(Arc::new(RefreshOnUnauthorizedStage::new(Arc::clone(
                &refresher,
            ))));
        for stage in self.request_stages {
            pipeline = pipeline.with_request_stage(stage);
        }
        for stage in self.response_stages {
            pipeline = pipeline.with_response_stage(stage);
        }

        AuthenticatedHttpClient {
            pipeline,
            store,
            refresher,
        }
    }
}
