use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{decimal, ApiClient};
use crate::error::HttpResult;
use crate::http::{MultipartForm, RequestDescriptor};

/// An animal listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    #[serde(default)]
    pub seller: Option<i64>,
    #[serde(default)]
    pub seller_email: Option<String>,
    pub animal_type: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default, deserialize_with = "decimal::deserialize_option")]
    pub weight: Option<String>,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub price: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImage {
    pub id: i64,
    #[serde(default)]
    pub listing: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ListingImage {
    /// Absolute URL when the backend provides one, else the stored path
    pub fn url(&self) -> Option<&str> {
        self.image_url.as_deref().or(self.image.as_deref())
    }
}

/// A listing with its images, as a detail page shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDetail {
    pub listing: Listing,
    pub images: Vec<ListingImage>,
    /// Index into `images` of the image to show first
    pub selected_image: Option<usize>,
}

impl ListingDetail {
    pub fn new(listing: Listing, images: Vec<ListingImage>) -> Self {
        let selected_image = images
            .iter()
            .position(|image| image.is_primary)
            .or(if images.is_empty() { None } else { Some(0) });
        Self {
            listing,
            images,
            selected_image,
        }
    }

    pub fn primary_image(&self) -> Option<&ListingImage> {
        self.selected_image.and_then(|i| self.images.get(i))
    }
}

/// Query filters for the public listing search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilters {
    pub animal_type: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub seller: Option<i64>,
    pub search: Option<String>,
}

impl ListingFilters {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(animal_type) = &self.animal_type {
            query.push(("animal_type".to_string(), animal_type.clone()));
        }
        if let Some(city) = &self.city {
            query.push(("city".to_string(), city.clone()));
        }
        if let Some(district) = &self.district {
            query.push(("district".to_string(), district.clone()));
        }
        if let Some(seller) = self.seller {
            query.push(("seller".to_string(), seller.to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        query
    }
}

/// Which of the seller's own listings to fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnListingsFilter {
    /// Include inactive listings owned by the caller
    pub mine: bool,
    /// Only soft-deleted listings
    pub deleted: bool,
}

/// Writable listing fields; unset fields are left out of the body
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// One file for [`ApiClient::upload_listing_images`]
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content: Bytes,
    pub mime_type: String,
    pub is_primary: bool,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            file_name,
            content: content.into(),
            mime_type,
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Result of uploading one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUploadOutcome {
    pub file_name: String,
    pub result: Result<ListingImage, String>,
}

impl ImageUploadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

fn listing_path(id: i64) -> String {
    format!("/api/animals/{}/", id)
}

fn images_path(id: i64) -> String {
    format!("/api/animals/{}/images/", id)
}

impl ApiClient {
    pub async fn list_listings(&self, filters: &ListingFilters) -> HttpResult<Vec<Listing>> {
        self.fetch_list(RequestDescriptor::get("/api/animals/").query_pairs(filters.to_query()))
            .await
    }

    pub async fn get_listing(&self, id: i64) -> HttpResult<Listing> {
        self.fetch(RequestDescriptor::get(listing_path(id))).await
    }

    pub async fn listing_images(&self, id: i64) -> HttpResult<Vec<ListingImage>> {
        self.fetch_list(RequestDescriptor::get(images_path(id))).await
    }

    /// Listing and images, fetched concurrently
    ///
    /// A failure to load images leaves the detail without images; only the
    /// listing fetch decides success.
    pub async fn listing_detail(&self, id: i64) -> HttpResult<ListingDetail> {
        let (listing, images) = tokio::join!(self.get_listing(id), self.listing_images(id));
        let listing = listing?;
        let images = images.unwrap_or_else(|e| {
            warn!(listing_id = id, error = %e, "Failed to load listing images");
            Vec::new()
        });
        Ok(ListingDetail::new(listing, images))
    }

    pub async fn my_listings(
        &self,
        seller: i64,
        filter: OwnListingsFilter,
    ) -> HttpResult<Vec<Listing>> {
        let mut descriptor =
            RequestDescriptor::get("/api/animals/").query("seller", seller.to_string());
        if filter.mine {
            descriptor = descriptor.query("mine", "true");
        }
        if filter.deleted {
            descriptor = descriptor.query("deleted", "true");
        }
        self.fetch_list(descriptor).await
    }

    pub async fn create_listing(&self, input: &ListingInput) -> HttpResult<Listing> {
        self.fetch(RequestDescriptor::post("/api/animals/").json(input)?)
            .await
    }

    pub async fn update_listing(&self, id: i64, input: &ListingInput) -> HttpResult<Listing> {
        self.fetch(RequestDescriptor::patch(listing_path(id)).json(input)?)
            .await
    }

    /// Soft delete; the listing moves to the seller's trash
    pub async fn delete_listing(&self, id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::delete(listing_path(id))).await
    }

    pub async fn permanently_delete_listing(&self, id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::delete(listing_path(id)).query("force", "true"))
            .await
    }

    /// Upload files one at a time; a failed file does not stop the rest
    pub async fn upload_listing_images(
        &self,
        listing_id: i64,
        uploads: Vec<ImageUpload>,
    ) -> Vec<ImageUploadOutcome> {
        let mut outcomes = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let form = MultipartForm::new()
                .file("image", upload.file_name.clone(), upload.mime_type, upload.content)
                .text("listing", listing_id.to_string())
                .text("is_primary", upload.is_primary.to_string());

            let result = self
                .fetch::<ListingImage>(
                    RequestDescriptor::post(images_path(listing_id)).multipart(form),
                )
                .await
                .map_err(|e| e.detail().unwrap_or_else(|| "Upload failed".to_string()));

            match &result {
                Ok(image) => debug!(listing_id, image_id = image.id, file = %upload.file_name, "Image uploaded"),
                Err(reason) => warn!(listing_id, file = %upload.file_name, reason = %reason, "Image upload failed"),
            }

            outcomes.push(ImageUploadOutcome {
                file_name: upload.file_name,
                result,
            });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockHttpClient;
    use crate::http::{AuthenticatedHttpClient, RequestBody};
    use reqwest::{Method, StatusCode};
    use std::sync::Arc;

    const LISTING_5: &str = r#"{"id":5,"seller":2,"animal_type":"cattle","breed":"Simmental","age":24,"weight":"420.50","price":"85000.00","location":"Konya","is_active":true,"created_at":"2024-05-01T10:00:00Z"}"#;

    fn client() -> (ApiClient, MockHttpClient) {
        let mock = MockHttpClient::new();
        let http = AuthenticatedHttpClient::builder(Arc::new(mock.clone())).build();
        (ApiClient::new(Arc::new(http)), mock)
    }

    fn image(id: i64, is_primary: bool) -> ListingImage {
        ListingImage {
            id,
            listing: Some(5),
            image: Some(format!("/media/{}.jpg", id)),
            image_url: None,
            is_primary,
            created_at: None,
        }
    }

    #[test]
    fn test_primary_image_selection() {
        let listing: Listing = serde_json::from_str(LISTING_5).unwrap();

        let detail = ListingDetail::new(listing.clone(), vec![image(1, false), image(2, true)]);
        assert_eq!(detail.primary_image().map(|i| i.id), Some(2));

        let detail = ListingDetail::new(listing.clone(), vec![image(1, false), image(3, false)]);
        assert_eq!(detail.primary_image().map(|i| i.id), Some(1));

        let detail = ListingDetail::new(listing, Vec::new());
        assert_eq!(detail.primary_image(), None);
    }

    #[tokio::test]
    async fn test_listing_detail_tolerates_image_failure() {
        let (api, mock) = client();
        mock.enqueue(Method::GET, "/api/animals/5/", StatusCode::OK, LISTING_5);
        mock.enqueue(Method::GET, "/api/animals/5/images/", StatusCode::INTERNAL_SERVER_ERROR, "");

        let detail = api.listing_detail(5).await.unwrap();
        assert_eq!(detail.listing.id, 5);
        assert_eq!(detail.listing.price, "85000.00");
        assert!(detail.images.is_empty());
    }

    #[tokio::test]
    async fn test_listing_detail_not_found() {
        let (api, mock) = client();
        mock.enqueue(Method::GET, "/api/animals/9/", StatusCode::NOT_FOUND, r#"{"detail":"Not found."}"#);
        mock.enqueue(Method::GET, "/api/animals/9/images/", StatusCode::OK, "[]");

        let err = api.listing_detail(9).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_filters_become_query_params() {
        let (api, mock) = client();
        mock.enqueue(Method::GET, "/api/animals/", StatusCode::OK, &format!(r#"{{"count":1,"next":null,"previous":null,"results":[{}]}}"#, LISTING_5));

        let filters = ListingFilters {
            animal_type: Some("sheep".into()),
            city: Some("Konya".into()),
            ..Default::default()
        };
        let listings = api.list_listings(&filters).await.unwrap();
        assert_eq!(listings.len(), 1);

        let sent = &mock.requests_to("/api/animals/")[0];
        assert!(sent.query.contains(&("animal_type".to_string(), "sheep".to_string())));
        assert!(sent.query.contains(&("city".to_string(), "Konya".to_string())));
    }

    #[tokio::test]
    async fn test_permanent_delete_forces() {
        let (api, mock) = client();
        mock.enqueue(Method::DELETE, "/api/animals/5/", StatusCode::NO_CONTENT, "");

        api.permanently_delete_listing(5).await.unwrap();
        let sent = &mock.requests_to("/api/animals/5/")[0];
        assert_eq!(sent.query, vec![("force".to_string(), "true".to_string())]);
    }

    #[tokio::test]
    async fn test_uploads_report_each_file() {
        let (api, mock) = client();
        mock.enqueue(
            Method::POST,
            "/api/animals/5/images/",
            StatusCode::CREATED,
            r#"{"id":11,"listing":5,"image":"/media/a.jpg","is_primary":true}"#,
        );
        mock.enqueue(
            Method::POST,
            "/api/animals/5/images/",
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Unsupported image"}"#,
        );

        let outcomes = api
            .upload_listing_images(
                5,
                vec![
                    ImageUpload::new("a.jpg", vec![1u8, 2, 3]).primary(),
                    ImageUpload::new("b.tiff", vec![4u8]),
                ],
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].result, Err("Unsupported image".to_string()));

        let sent = mock.requests_to("/api/animals/5/images/");
        assert!(matches!(sent[0].body, RequestBody::Multipart(_)));
    }
}
