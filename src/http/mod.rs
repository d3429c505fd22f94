pub mod authenticated;
pub mod client;
pub mod middleware;
pub mod mock;
pub mod request;
pub mod response;

pub use authenticated::{
    AuthenticatedHttpClient, AuthenticatedHttpClientBuilder, BearerTokenStage,
    RefreshOnUnauthorizedStage, DEFAULT_REFRESH_PATH,
};
pub use client::{HttpClient, ReqwestHttpClient};
pub use middleware::{Pipeline, RequestStage, ResponseAction, ResponseStage};
pub use mock::{MockHttpClient, RecordedRequest};
pub use request::{MultipartForm, MultipartPart, PendingRequest, RequestBody, RequestDescriptor};
pub use response::HttpResponse;
