//! Integration tests for bearer injection and silent token refresh
mod common;

use anyhow::Result;
use mockito::Matcher;
use reqwest::StatusCode;
use serde_json::json;

use common::{bearer, listing_json, TestEnvironment, REFRESH_PATH};
use herdline::auth::{CredentialPair, InvalidationReason, TokenKey, TokenStore};
use herdline::{AuthError, HttpError, RefreshMode, RequestDescriptor};

#[tokio::test]
async fn test_second_401_is_returned_after_one_refresh() -> Result<()> {
    let mut env = TestEnvironment::new(Some(CredentialPair::new("expired", "r1"))).await;

    let resource = env
        .server
        .mock("GET", "/api/notifications/")
        .with_status(401)
        .with_body(r#"{"detail":"Given token not valid for any token type"}"#)
        .expect(2)
        .create_async()
        .await;
    let refresh = env
        .server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::Json(json!({"refresh": "r1"})))
        .with_status(200)
        .with_body(r#"{"access":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = env
        .client
        .request(RequestDescriptor::get("/api/notifications/"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

    resource.assert_async().await;
    refresh.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_recovered_transparently() -> Result<()> {
    let mut env = TestEnvironment::new(Some(CredentialPair::new("expired", "r1"))).await;

    let stale = env
        .server
        .mock("GET", "/api/animals/5/")
        .match_header("authorization", bearer("expired").as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = env
        .server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh = env
        .server
        .mock("GET", "/api/animals/5/")
        .match_header("authorization", bearer("fresh").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing_json(5, "sheep"))
        .expect(1)
        .create_async()
        .await;

    let listing = env.api().get_listing(5).await?;
    assert_eq!(listing.id, 5);
    assert_eq!(
        env.store.credentials()?,
        Some(CredentialPair::new("fresh", "r1"))
    );
    assert!(env.drain_events().is_empty());

    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_refresh_token_never_calls_refresh() -> Result<()> {
    let mut env = TestEnvironment::new(None).await;
    env.store.set(TokenKey::Access, "orphan")?;

    let resource = env
        .server
        .mock("POST", "/api/messages/")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = env
        .server
        .mock("POST", REFRESH_PATH)
        .expect(0)
        .create_async()
        .await;

    let err = env
        .client
        .request(RequestDescriptor::post("/api/messages/").json_value(json!({"content": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Auth(AuthError::NoRefreshToken)));
    assert!(err.is_auth_fatal());

    let events = env.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, InvalidationReason::NoRefreshToken);
    assert!(events[0].redirect_to_login);

    resource.assert_async().await;
    refresh.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_clears_both_tokens_and_signals_once() -> Result<()> {
    let mut env = TestEnvironment::new(Some(CredentialPair::new("expired", "revoked"))).await;

    let resource = env
        .server
        .mock("DELETE", "/api/animals/5/")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = env
        .server
        .mock("POST", REFRESH_PATH)
        .with_status(401)
        .with_body(r#"{"detail":"Token is blacklisted"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = env.api().delete_listing(5).await.unwrap_err();
    assert!(matches!(err, HttpError::Auth(AuthError::RefreshFailed { .. })));

    assert_eq!(env.store.get(TokenKey::Access)?, None);
    assert_eq!(env.store.get(TokenKey::Refresh)?, None);

    let events = env.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].method, "DELETE");
    assert!(events[0].redirect_to_login);

    resource.assert_async().await;
    refresh.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_anonymous_reads_carry_no_bearer() -> Result<()> {
    let mut env = TestEnvironment::new(None).await;

    let listings = env
        .server
        .mock("GET", "/api/animals/")
        .match_header("authorization", Matcher::Missing)
        .match_query(Matcher::UrlEncoded("city".into(), "Konya".into()))
        .with_status(200)
        .with_body(format!("[{}]", listing_json(5, "sheep")))
        .expect(1)
        .create_async()
        .await;

    let filters = herdline::api::ListingFilters {
        city: Some("Konya".into()),
        ..Default::default()
    };
    let found = env.api().list_listings(&filters).await?;
    assert_eq!(found.len(), 1);

    listings.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_connection_failure_is_network_error() -> Result<()> {
    let transport = herdline::http::ReqwestHttpClient::new("http://127.0.0.1:9")?;
    let client = herdline::AuthenticatedHttpClient::builder(std::sync::Arc::new(transport)).build();

    let err = client
        .request(RequestDescriptor::get("/api/animals/"))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network { timeout: false, .. }));
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_expiry_in_independent_mode() -> Result<()> {
    let mut env = TestEnvironment::with_mode(
        Some(CredentialPair::new("expired", "r1")),
        RefreshMode::Independent,
    )
    .await;

    for path in ["/api/notifications/", "/api/messages/conversations/"] {
        env.server
            .mock("GET", path)
            .match_header("authorization", bearer("expired").as_str())
            .with_status(401)
            .create_async()
            .await;
        env.server
            .mock("GET", path)
            .match_header("authorization", bearer("fresh").as_str())
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
    }
    let refresh = env
        .server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_body(r#"{"access":"fresh"}"#)
        .expect(2)
        .create_async()
        .await;

    let api = env.api();
    let (notifications, conversations) = tokio::join!(api.notifications(), api.conversations());
    assert!(notifications?.is_empty());
    assert!(conversations?.is_empty());

    refresh.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_timeout_is_network_error_without_refresh() -> Result<()> {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use herdline::auth::{MemoryTokenStore, SessionEvents};
    use herdline::config::Config;
    use tokio::net::TcpListener;

    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let mut config = Config::default();
    config.api.base_url = format!("http://{}", addr);
    config.api.timeout_seconds = 1;

    let store = Arc::new(MemoryTokenStore::with_pair(&CredentialPair::new("a0", "r0")));
    let session_events = SessionEvents::default();
    let mut events = session_events.subscribe();
    let client = herdline::AuthenticatedHttpClient::from_config(
        &config,
        store.clone(),
        Arc::new(session_events),
    )?;

    let err = client
        .request(RequestDescriptor::get("/api/notifications/"))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network { timeout: true, .. }), "{:?}", err);

    // Only the original attempt reached the server: no refresh, no retry
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.credentials()?,
        Some(CredentialPair::new("a0", "r0"))
    );
    assert!(events.try_recv().is_err());
    Ok(())
}
