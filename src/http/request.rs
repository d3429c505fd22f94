//! Request descriptors
//!
//! A [`RequestDescriptor`] is an owned, cloneable description of a call.
//! Bodies stay replayable so that a request can be issued a second time
//! after a token refresh.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{HttpError, HttpResult};

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        content: Bytes,
    },
}

/// Owned multipart form description, converted to a reqwest form at send time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<MultipartPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file field
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            content: content.into(),
        });
        self
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// Build a reqwest form from this description
    pub fn to_form(&self) -> HttpResult<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    mime,
                    content,
                } => {
                    let part = reqwest::multipart::Part::bytes(content.to_vec())
                        .file_name(file_name.clone())
                        .mime_str(mime)
                        .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Bytes { content: Bytes, content_type: String },
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Natural content type of the body; multipart lets the transport pick the boundary
    pub fn content_type(&self) -> Option<&str> {
        match self {
            RequestBody::Empty | RequestBody::Multipart(_) => None,
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::Form(_) => Some("application/x-www-form-urlencoded"),
            RequestBody::Bytes { content_type, .. } => Some(content_type),
        }
    }
}

/// Description of an outbound call relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Overrides the content type derived from the body
    pub content_type: Option<String>,
    /// Whether a 401 should trigger a silent refresh and retry
    pub refresh_on_unauthorized: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            content_type: None,
            refresh_on_unauthorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append several query parameters
    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header, rejecting names or values that are not valid HTTP
    pub fn header(mut self, name: &str, value: &str) -> HttpResult<Self> {
        let name =
            HeaderName::from_str(name).map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn json_value(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Serialize `body` as the JSON payload
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> HttpResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| HttpError::InvalidRequest(format!("failed to encode body: {}", e)))?;
        Ok(self.json_value(value))
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn bytes(mut self, content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = RequestBody::Bytes {
            content: content.into(),
            content_type: content_type.into(),
        };
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Surface 401s directly instead of attempting a refresh
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    /// Content type that will be sent, if any
    ///
    /// Multipart bodies always carry the transport's own header, since
    /// only it knows the boundary.
    pub fn effective_content_type(&self) -> Option<&str> {
        if let RequestBody::Multipart(_) = self.body {
            return None;
        }
        self.content_type
            .as_deref()
            .or_else(|| self.body.content_type())
    }

    /// Resolve the full URL against `base`
    pub fn url(&self, base: &Url) -> HttpResult<Url> {
        let mut url = base
            .join(&self.path)
            .map_err(|e| HttpError::InvalidRequest(format!("bad path '{}': {}", self.path, e)))?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

/// An in-flight logical request
///
/// The retry flag moves from false to true at most once. A request that
/// has already retried is never retried again.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    id: Uuid,
    descriptor: RequestDescriptor,
    retried: bool,
}

impl PendingRequest {
    pub fn new(descriptor: RequestDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            descriptor,
            retried: false,
        }
    }

    /// Identifier shared by every attempt of this logical request
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn method(&self) -> &Method {
        &self.descriptor.method
    }

    pub fn path(&self) -> &str {
        &self.descriptor.path
    }

    pub fn retried(&self) -> bool {
        self.retried
    }

    /// Flip the retry flag. Returns false if it was already set.
    pub fn mark_retried(&mut self) -> bool {
        if self.retried {
            return false;
        }
        self.retried = true;
        true
    }

    /// Set the bearer credential header
    pub fn set_bearer(&mut self, token: &str) -> HttpResult<()> {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| HttpError::InvalidRequest(format!("invalid access token: {}", e)))?;
        self.descriptor.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    pub fn clear_bearer(&mut self) {
        self.descriptor.headers.remove(AUTHORIZATION);
    }

    /// Current bearer token, if one is attached
    pub fn bearer(&self) -> Option<&str> {
        self.descriptor
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}
