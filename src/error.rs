use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Authentication failures raised while recovering from an expired access token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A 401 was received and there was no refresh token to exchange
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The refresh endpoint itself failed
    #[error("failed to refresh access token: {reason}")]
    RefreshFailed { reason: String },
}

/// Errors raised by token store backends
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("token store I/O failed: {0}")]
    Io(String),

    #[error("token store data is invalid: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Main error type returned by the HTTP layer
#[derive(Error, Debug, Clone)]
pub enum HttpError {
    /// No response was obtained (connectivity, DNS, timeout)
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },

    /// A response arrived but its body did not have the expected shape
    #[error("failed to decode response: {message}")]
    Decode { message: String },

    /// Non-2xx response surfaced to the caller
    #[error("request failed with status {code}")]
    Status { code: StatusCode, body: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for the HTTP layer
pub type HttpResult<T> = Result<T, HttpError>;

/// Coarse classification used by views to pick a failure presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connectivity problems, timeouts
    Network,
    /// Unexpected response shape
    Decode,
    /// 404 on an entity load
    NotFound,
    /// 400 with field errors
    Validation,
    /// 403
    Forbidden,
    /// Any other 4xx
    Client,
    /// 5xx
    Server,
    /// Session cannot be recovered, user must sign in again
    AuthFatal,
    /// Bugs and local failures
    Internal,
}

impl ErrorCategory {
    /// Whether retrying the same call later could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Decode => "DECODE",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Forbidden => "FORBIDDEN",
            ErrorCategory::Client => "CLIENT",
            ErrorCategory::Server => "SERVER",
            ErrorCategory::AuthFatal => "AUTH_FATAL",
            ErrorCategory::Internal => "INTERNAL",
        };
        write!(f, "{}", name)
    }
}

#[derive(Deserialize)]
struct DetailBody {
    detail: String,
}

impl HttpError {
    /// Create a network error
    pub fn network(message: impl fmt::Display) -> Self {
        HttpError::Network {
            message: message.to_string(),
            timeout: false,
        }
    }

    /// Create a network error caused by a timeout
    pub fn timeout(message: impl fmt::Display) -> Self {
        HttpError::Network {
            message: message.to_string(),
            timeout: true,
        }
    }

    /// Create a decode error
    pub fn decode(message: impl fmt::Display) -> Self {
        HttpError::Decode {
            message: message.to_string(),
        }
    }

    /// Status code of the response, if one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            HttpError::Network { .. } => ErrorCategory::Network,
            HttpError::Decode { .. } => ErrorCategory::Decode,
            HttpError::Status { code, .. } => match *code {
                StatusCode::NOT_FOUND => ErrorCategory::NotFound,
                StatusCode::BAD_REQUEST => ErrorCategory::Validation,
                // Only reachable when refresh was skipped or already spent
                StatusCode::UNAUTHORIZED => ErrorCategory::Client,
                StatusCode::FORBIDDEN => ErrorCategory::Forbidden,
                code if code.is_server_error() => ErrorCategory::Server,
                _ => ErrorCategory::Client,
            },
            HttpError::Auth(_) => ErrorCategory::AuthFatal,
            HttpError::Store(_) | HttpError::InvalidRequest(_) | HttpError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    pub fn is_auth_fatal(&self) -> bool {
        self.category() == ErrorCategory::AuthFatal
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// The backend's `{"detail": "..."}` message, when the body carries one
    pub fn detail(&self) -> Option<String> {
        match self {
            HttpError::Status { body, .. } => serde_json::from_str::<DetailBody>(body)
                .ok()
                .map(|b| b.detail),
            _ => None,
        }
    }

    /// Text suitable for an error state in a view
    pub fn user_message(&self) -> String {
        self.detail().unwrap_or_else(|| self.to_string())
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::timeout(err)
        } else if err.is_builder() {
            HttpError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            HttpError::decode(err)
        } else {
            // connect, request and body errors all mean no usable response
            HttpError::network(err)
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::decode(err)
    }
}
