use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The two logical keys held by a token store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    /// Key under which the value is persisted
    pub fn storage_key(&self) -> &'static str {
        match self {
            TokenKey::Access => "access_token",
            TokenKey::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

/// Access/refresh credential pair as returned by login and registration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens stay out of logs
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Claims carried in the access token payload
///
/// Decoded without signature verification; only for display and routing
/// decisions, never for authorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl AccessClaims {
    /// Decode the payload segment of a JWT
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Access token payload is not base64url");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Access token payload is not valid JSON");
                None
            }
        }
    }

    /// When the token expires, if it says
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|exp| exp <= Utc::now())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Build an unsigned JWT with the given payload
    pub(crate) fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.sig", header, body)
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(json!({
            "user_id": 42,
            "roles": ["USER", "BUTCHER"],
            "exp": 4_102_444_800i64,
            "token_type": "access"
        }));

        let claims = AccessClaims::decode(&token).unwrap();
        assert_eq!(claims.user_id, Some(42));
        assert!(claims.has_role("butcher"));
        assert!(!claims.has_role("admin"));
        assert!(!claims.is_expired());
        assert_eq!(claims.expires_at().unwrap().timestamp(), 4_102_444_800);
    }

    #[test]
    fn test_expired_claims() {
        let claims = AccessClaims::decode(&jwt(json!({"exp": 1}))).unwrap();
        assert!(claims.is_expired());
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(AccessClaims::decode("").is_none());
        assert!(AccessClaims::decode("only.two").is_none());
        assert!(AccessClaims::decode("a.b.c.d").is_none());
        assert!(AccessClaims::decode("a.!!!.c").is_none());
        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("plain"));
        assert!(AccessClaims::decode(&not_json).is_none());
    }

    #[test]
    fn test_pair_debug_is_redacted() {
        let pair = CredentialPair::new("secret-access", "secret-refresh");
        let printed = format!("{:?}", pair);
        assert!(!printed.contains("secret"));
    }
}
