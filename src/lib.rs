pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;

// Re-export core components
pub use crate::api::ApiClient;
pub use crate::auth::{AuthService, RefreshMode, SessionEvents, SessionListener, TokenStore};
pub use crate::config::{Config, ConfigManager};
pub use crate::error::{AuthError, ErrorCategory, HttpError, HttpResult, StoreError};
pub use crate::guard::{LoadSite, LoadState, SequenceToken, StaleResponseGuard};
pub use crate::http::{AuthenticatedHttpClient, HttpClient, RequestDescriptor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
