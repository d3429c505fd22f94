//! Request/response pipeline
//!
//! Request stages rewrite a [`PendingRequest`] before it goes out. Response
//! stages inspect what came back and either pass the response on or ask
//! for the request to be issued again.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{HttpError, HttpResult};
use crate::http::client::HttpClient;
use crate::http::request::{PendingRequest, RequestDescriptor};
use crate::http::response::HttpResponse;

/// Outcome of a response stage
#[derive(Debug)]
pub enum ResponseAction {
    /// Hand the response to the next stage (or the caller)
    Continue(HttpResponse),
    /// Issue this request again; it must carry the retry flag
    Retry(PendingRequest),
}

/// Transform applied to every attempt before it is sent
#[async_trait]
pub trait RequestStage: Send + Sync + Debug {
    async fn on_request(&self, request: PendingRequest) -> HttpResult<PendingRequest>;
}

/// Transform applied to every response
#[async_trait]
pub trait ResponseStage: Send + Sync + Debug {
    async fn on_response(
        &self,
        request: &PendingRequest,
        response: HttpResponse,
    ) -> HttpResult<ResponseAction>;
}

/// Ordered chain of stages around a transport
#[derive(Debug, Clone)]
pub struct Pipeline {
    transport: Arc<dyn HttpClient>,
    request_stages: Vec<Arc<dyn RequestStage>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn HttpClient>) -> Self {
        Self {
            transport,
            request_stages: Vec::new(),
            response_stages: Vec::new(),
        }
    }

    pub fn with_request_stage(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.request_stages.push(stage);
        self
    }

    pub fn with_response_stage(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    pub fn transport(&self) -> &Arc<dyn HttpClient> {
        &self.transport
    }

    /// Run a request through the chain and return the final response
    ///
    /// A logical request is sent at most twice: once as issued and once
    /// after a stage asked for a retry.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> HttpResult<HttpResponse> {
        let mut pending = PendingRequest::new(descriptor);

        'attempt: loop {
            let mut prepared = pending;
            for stage in &self.request_stages {
                prepared = stage.on_request(prepared).await?;
            }

            let mut response = self.transport.send(&prepared).await?;

            for stage in &self.response_stages {
                match stage.on_response(&prepared, response).await? {
                    ResponseAction::Continue(next) => response = next,
                    ResponseAction::Retry(next) if !prepared.retried() && next.retried() => {
                        debug!(
                            request_id = %next.id(),
                            method = %next.method(),
                            path = %next.path(),
                            "Retrying request"
                        );
                        pending = next;
                        continue 'attempt;
                    }
                    ResponseAction::Retry(next) => {
                        error!(
                            request_id = %next.id(),
                            path = %next.path(),
                            "Response stage asked for a retry outside the retry budget"
                        );
                        return Err(HttpError::Internal(format!(
                            "retry budget exhausted for {} {}",
                            next.method(),
                            next.path()
                        )));
                    }
                }
            }

            return Ok(response);
        }
    }
}
