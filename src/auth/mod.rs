pub mod refresh;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

pub use refresh::{RefreshMode, TokenRefresher};
pub use service::AuthService;
pub use session::{
    InvalidationReason, LoggingSessionListener, SessionEvents, SessionInvalidated,
    SessionListener,
};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{AccessClaims, CredentialPair, TokenKey};
