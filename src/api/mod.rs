//! Typed wrappers over the marketplace REST endpoints
//!
//! Each wrapper builds a [`RequestDescriptor`], sends it through the
//! authenticated client and decodes the body. None of them carry
//! marketplace rules; the backend owns those.

pub mod accounts;
pub mod butchers;
pub mod listings;
pub mod messages;
pub mod notifications;
pub mod partnerships;
pub mod recommendations;

pub use accounts::{LoginRequest, RegisterRequest, TokenPair, User};
pub use butchers::{Appointment, AppointmentStatus, ButcherProfile, NewAppointment};
pub use listings::{
    ImageUpload, ImageUploadOutcome, Listing, ListingDetail, ListingFilters, ListingImage,
    ListingInput, OwnListingsFilter,
};
pub use messages::{Conversation, ListingSummary, Message};
pub use notifications::Notification;
pub use partnerships::{
    JoinRequest, NewPartnership, Partnership, PartnershipFilters, PartnershipMember,
};
pub use recommendations::{InteractionKind, RecommendationQuery};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::HttpResult;
use crate::http::{AuthenticatedHttpClient, RequestDescriptor};

/// List endpoints answer with a bare array or a paginated envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Paginated<T> {
    List(Vec<T>),
    Page {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
}

impl<T> Paginated<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Paginated::Page { results, .. } => results,
            Paginated::List(items) => items,
        }
    }

    /// Total across all pages, when the backend reports it
    pub fn total(&self) -> Option<u64> {
        match self {
            Paginated::Page { count, .. } => *count,
            Paginated::List(items) => Some(items.len() as u64),
        }
    }

    pub fn has_next(&self) -> bool {
        matches!(self, Paginated::Page { next: Some(_), .. })
    }
}

/// Entry point for the typed endpoint wrappers
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Arc<AuthenticatedHttpClient>,
}

impl ApiClient {
    pub fn new(http: Arc<AuthenticatedHttpClient>) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &Arc<AuthenticatedHttpClient> {
        &self.http
    }

    /// Fetch any path as loose JSON
    pub async fn get_value(&self, path: &str) -> HttpResult<serde_json::Value> {
        self.fetch(RequestDescriptor::get(path)).await
    }

    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> HttpResult<T> {
        self.http.request(descriptor).await?.json()
    }

    pub(crate) async fn fetch_list<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> HttpResult<Vec<T>> {
        Ok(self.fetch::<Paginated<T>>(descriptor).await?.into_items())
    }

    /// Send a request whose response body is not needed
    pub(crate) async fn execute(&self, descriptor: RequestDescriptor) -> HttpResult<()> {
        self.http.request(descriptor).await?;
        Ok(())
    }
}

/// Django serializes decimals as strings; accept numbers too
pub(crate) mod decimal {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    impl Raw {
        fn into_string(self) -> String {
            match self {
                Raw::Text(text) => text,
                Raw::Int(value) => value.to_string(),
                Raw::Float(value) => value.to_string(),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Raw::deserialize(deserializer).map(Raw::into_string)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Raw>::deserialize(deserializer)?.map(Raw::into_string))
    }
}
