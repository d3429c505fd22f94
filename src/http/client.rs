//! HTTP transport abstraction
//!
//! This module provides a clean interface for putting a single request on
//! the wire, which can be easily mocked for testing. Authentication and
//! retry live one layer up, in the pipeline.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::ApiConfig;
use crate::error::{HttpError, HttpResult};
use crate::http::request::{PendingRequest, RequestBody};
use crate::http::response::HttpResponse;

/// HTTP client trait for abstracting HTTP requests
#[async_trait]
pub trait HttpClient: Send + Sync + Debug {
    /// Send one attempt of `request` and return whatever the server answered
    ///
    /// Non-2xx statuses are returned as responses, not errors. Only a
    /// missing response is an error.
    async fn send(&self, request: &PendingRequest) -> HttpResult<HttpResponse>;
}

/// Implementation of HttpClient using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestHttpClient {
    /// Create a client for `base_url` with reqwest defaults
    pub fn new(base_url: &str) -> HttpResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HttpError::InvalidRequest(format!("bad base url: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    /// Create a client from API configuration
    pub fn from_config(config: &ApiConfig) -> HttpResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| HttpError::InvalidRequest(format!("bad base url: {}", e)))?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if config.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_seconds));
        }
        let client = builder.build()?;

        Ok(Self { client, base_url })
    }

    /// Create a new client with a preconfigured reqwest client
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: &PendingRequest) -> HttpResult<HttpResponse> {
        let descriptor = request.descriptor();
        let url = descriptor.url(&self.base_url)?;

        let mut headers = descriptor.headers.clone();
        if let RequestBody::Multipart(_) = descriptor.body {
            headers.remove(CONTENT_TYPE);
        }
        if let Some(content_type) = descriptor.effective_content_type() {
            let value = HeaderValue::from_str(content_type)
                .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
            headers.insert(CONTENT_TYPE, value);
        }

        let mut builder = self
            .client
            .request(descriptor.method.clone(), url.clone())
            .headers(headers);

        builder = match &descriptor.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(value).map_err(|e| {
                HttpError::InvalidRequest(format!("failed to encode body: {}", e))
            })?),
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Bytes { content, .. } => builder.body(content.clone()),
            RequestBody::Multipart(form) => builder.multipart(form.to_form()?),
        };

        trace!(request_id = %request.id(), method = %descriptor.method, url = %url, "Sending request");

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            request_id = %request.id(),
            method = %descriptor.method,
            path = %descriptor.path,
            status = %status,
            "Received response"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
