//! Scripted in-process transport for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HttpError, HttpResult};
use crate::http::client::HttpClient;
use crate::http::request::{PendingRequest, RequestBody};
use crate::http::response::HttpResponse;

/// A request observed by [`MockHttpClient`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_id: uuid::Uuid,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Bearer token attached to the attempt, if any
    pub bearer: Option<String>,
    pub body: RequestBody,
    pub retried: bool,
}

#[derive(Debug, Clone)]
struct MockReply {
    result: HttpResult<HttpResponse>,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Route {
    queue: VecDeque<MockReply>,
    fallback: Option<MockReply>,
}

/// Mock HTTP client for testing
///
/// Replies are looked up by method and path. Queued replies are consumed in
/// order; once the queue is empty the route's standing reply is used.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    routes: Arc<Mutex<HashMap<(Method, String), Route>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new MockHttpClient
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: MockReply) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .queue
            .push_back(reply);
    }

    /// Queue a single reply for `method path`
    pub fn enqueue(&self, method: Method, path: &str, status: StatusCode, body: &str) {
        self.push(
            method,
            path,
            MockReply {
                result: Ok(HttpResponse::new(status, body.to_string())),
                delay: None,
            },
        );
    }

    /// Queue a JSON reply
    pub fn enqueue_json<T: serde::Serialize>(
        &self,
        method: Method,
        path: &str,
        status: StatusCode,
        data: &T,
    ) -> HttpResult<()> {
        let body = serde_json::to_string(data)
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        self.enqueue(method, path, status, &body);
        Ok(())
    }

    /// Queue a reply that only resolves after `delay`
    pub fn enqueue_delayed(
        &self,
        method: Method,
        path: &str,
        status: StatusCode,
        body: &str,
        delay: Duration,
    ) {
        self.push(
            method,
            path,
            MockReply {
                result: Ok(HttpResponse::new(status, body.to_string())),
                delay: Some(delay),
            },
        );
    }

    /// Queue a transport failure (no response)
    pub fn enqueue_error(&self, method: Method, path: &str, error: HttpError) {
        self.push(
            method,
            path,
            MockReply {
                result: Err(error),
                delay: None,
            },
        );
    }

    /// Reply with `status`/`body` every time the queue for this route is empty
    pub fn always(&self, method: Method, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .fallback = Some(MockReply {
            result: Ok(HttpResponse::new(status, body.to_string())),
            delay: None,
        });
    }

    /// Get the list of recorded requests
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Requests recorded for one path
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Number of requests recorded for one path
    pub fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    fn next_reply(&self, method: &Method, path: &str) -> Option<MockReply> {
        let mut routes = self.routes.lock();
        let route = routes.get_mut(&(method.clone(), path.to_string()))?;
        route.queue.pop_front().or_else(|| route.fallback.clone())
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: &PendingRequest) -> HttpResult<HttpResponse> {
        let descriptor = request.descriptor();
        self.requests.lock().push(RecordedRequest {
            request_id: request.id(),
            method: descriptor.method.clone(),
            path: descriptor.path.clone(),
            query: descriptor.query.clone(),
            bearer: request.bearer().map(str::to_string),
            body: descriptor.body.clone(),
            retried: request.retried(),
        });

        let reply = self
            .next_reply(&descriptor.method, &descriptor.path)
            .ok_or_else(|| {
                HttpError::network(format!(
                    "No mock response for {} {}",
                    descriptor.method, descriptor.path
                ))
            })?;

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.result
    }
}
