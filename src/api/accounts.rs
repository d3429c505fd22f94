use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::auth::token::CredentialPair;
use crate::error::HttpResult;
use crate::http::RequestDescriptor;

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const ME_PATH: &str = "/api/auth/me/";

/// The signed-in user as `/api/auth/me/` describes them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    pub is_butcher: bool,
    /// Initial butcher profile fields when `is_butcher` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub butcher_profile: Option<serde_json::Value>,
}

/// Token pair returned by login and registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl From<TokenPair> for CredentialPair {
    fn from(pair: TokenPair) -> Self {
        CredentialPair::new(pair.access, pair.refresh)
    }
}

/// Registration answers with the tokens at the top level or under `tokens`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegisterResponse {
    Flat(TokenPair),
    Nested { tokens: TokenPair },
}

impl ApiClient {
    /// Exchange credentials for a token pair; a 401 here means wrong credentials
    pub async fn login(&self, request: &LoginRequest) -> HttpResult<TokenPair> {
        self.login_at(LOGIN_PATH, request).await
    }

    pub(crate) async fn login_at(&self, path: &str, request: &LoginRequest) -> HttpResult<TokenPair> {
        self.fetch(RequestDescriptor::post(path).json(request)?.without_refresh())
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> HttpResult<TokenPair> {
        self.register_at(REGISTER_PATH, request).await
    }

    pub(crate) async fn register_at(
        &self,
        path: &str,
        request: &RegisterRequest,
    ) -> HttpResult<TokenPair> {
        let response: RegisterResponse = self
            .fetch(RequestDescriptor::post(path).json(request)?.without_refresh())
            .await?;
        Ok(match response {
            RegisterResponse::Flat(pair) => pair,
            RegisterResponse::Nested { tokens } => tokens,
        })
    }

    pub async fn me(&self) -> HttpResult<User> {
        self.me_at(ME_PATH).await
    }

    pub(crate) async fn me_at(&self, path: &str) -> HttpResult<User> {
        self.fetch(RequestDescriptor::get(path)).await
    }
}
