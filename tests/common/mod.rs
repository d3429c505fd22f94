//! Shared harness for the integration tests
//!
//! Each environment runs a mockito server and points a real reqwest-backed
//! client at it.
#![allow(dead_code)]

use std::sync::Arc;

use herdline::api::ApiClient;
use herdline::auth::session::SessionInvalidated;
use herdline::auth::{CredentialPair, MemoryTokenStore, SessionEvents};
use herdline::http::{AuthenticatedHttpClient, ReqwestHttpClient};
use herdline::RefreshMode;
use tokio::sync::broadcast;

pub const REFRESH_PATH: &str = "/api/auth/refresh/";

pub struct TestEnvironment {
    pub server: mockito::ServerGuard,
    pub store: Arc<MemoryTokenStore>,
    pub events: broadcast::Receiver<SessionInvalidated>,
    pub client: AuthenticatedHttpClient,
}

impl TestEnvironment {
    pub async fn new(pair: Option<CredentialPair>) -> Self {
        Self::with_mode(pair, RefreshMode::SingleFlight).await
    }

    pub async fn with_mode(pair: Option<CredentialPair>, mode: RefreshMode) -> Self {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(match pair {
            Some(pair) => MemoryTokenStore::with_pair(&pair),
            None => MemoryTokenStore::new(),
        });
        let session_events = SessionEvents::default();
        let events = session_events.subscribe();

        let transport = ReqwestHttpClient::new(&server.url()).expect("mock server url");
        let client = AuthenticatedHttpClient::builder(Arc::new(transport))
            .token_store(store.clone())
            .session_listener(Arc::new(session_events))
            .refresh_mode(mode)
            .build();

        Self {
            server,
            store,
            events,
            client,
        }
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(Arc::new(self.client.clone()))
    }

    /// Every invalidation raised so far
    pub fn drain_events(&mut self) -> Vec<SessionInvalidated> {
        let mut received = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            received.push(event);
        }
        received
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn listing_json(id: i64, animal_type: &str) -> String {
    serde_json::json!({
        "id": id,
        "seller": 2,
        "animal_type": animal_type,
        "breed": "Merino",
        "age": 18,
        "weight": "61.00",
        "price": "9500.00",
        "location": "Konya",
        "is_active": true
    })
    .to_string()
}
