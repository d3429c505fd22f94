use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tokio::sync::broadcast;
use tracing::warn;

/// Default capacity of the session event channel
pub const SESSION_EVENT_CAPACITY: usize = 16;

/// Why the session was invalidated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidationReason {
    /// A 401 arrived and no refresh token was stored
    NoRefreshToken,
    /// The refresh endpoint failed
    RefreshFailed { reason: String },
}

/// Raised once per unrecoverable refresh failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInvalidated {
    pub reason: InvalidationReason,
    /// Method of the request that hit the 401
    pub method: String,
    /// Path of the request that hit the 401
    pub path: String,
    /// Whether the application should send the user to the login view
    pub redirect_to_login: bool,
    pub at: DateTime<Utc>,
}

impl SessionInvalidated {
    /// Build an event for a request; anonymous reads keep browsing unless told otherwise
    pub fn new(
        reason: InvalidationReason,
        method: &Method,
        path: &str,
        redirect_on_public_read: bool,
    ) -> Self {
        let redirect_to_login = *method != Method::GET || redirect_on_public_read;
        Self {
            reason,
            method: method.to_string(),
            path: path.to_string(),
            redirect_to_login,
            at: Utc::now(),
        }
    }
}

/// Navigation facility notified when the session cannot be recovered
pub trait SessionListener: Send + Sync + Debug {
    fn session_invalidated(&self, event: &SessionInvalidated);
}

/// Listener that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSessionListener;

impl SessionListener for LoggingSessionListener {
    fn session_invalidated(&self, event: &SessionInvalidated) {
        warn!(
            reason = ?event.reason,
            method = %event.method,
            path = %event.path,
            redirect_to_login = event.redirect_to_login,
            "Session invalidated"
        );
    }
}

/// Listener that broadcasts invalidations to any number of subscribers
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionInvalidated>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionInvalidated> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(SESSION_EVENT_CAPACITY)
    }
}

impl SessionListener for SessionEvents {
    fn session_invalidated(&self, event: &SessionInvalidated) {
        LoggingSessionListener.session_invalidated(event);
        // No subscribers is fine; nobody is waiting to redirect
        let _ = self.sender.send(event.clone());
    }
}
