use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::HttpResult;
use crate::http::RequestDescriptor;

/// A group purchase looking for partners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: i64,
    #[serde(default)]
    pub creator: Option<i64>,
    #[serde(default)]
    pub creator_username: Option<String>,
    pub city: String,
    pub person_count: u32,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub is_full: bool,
    #[serde(default)]
    pub user_is_member: bool,
    #[serde(default)]
    pub user_is_creator: bool,
    #[serde(default)]
    pub user_request_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnershipMember {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: i64,
    pub partnership: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub user_username: Option<String>,
    #[serde(default)]
    pub partnership_city: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPartnership {
    pub city: String,
    pub person_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnershipFilters {
    pub city: Option<String>,
    pub show_closed: bool,
}

fn partnership_path(id: i64, action: &str) -> String {
    if action.is_empty() {
        format!("/api/partnerships/{}/", id)
    } else {
        format!("/api/partnerships/{}/{}/", id, action)
    }
}

impl ApiClient {
    pub async fn partnerships(&self, filters: &PartnershipFilters) -> HttpResult<Vec<Partnership>> {
        let mut descriptor = RequestDescriptor::get("/api/partnerships/");
        if let Some(city) = &filters.city {
            descriptor = descriptor.query("city", city.clone());
        }
        if filters.show_closed {
            descriptor = descriptor.query("show_closed", "true");
        }
        self.fetch_list(descriptor).await
    }

    pub async fn partnership(&self, id: i64) -> HttpResult<Partnership> {
        self.fetch(RequestDescriptor::get(partnership_path(id, "")))
            .await
    }

    pub async fn create_partnership(&self, input: &NewPartnership) -> HttpResult<Partnership> {
        self.fetch(RequestDescriptor::post("/api/partnerships/").json(input)?)
            .await
    }

    pub async fn request_join(&self, id: i64) -> HttpResult<JoinRequest> {
        self.fetch(RequestDescriptor::post(partnership_path(id, "request_join")))
            .await
    }

    pub async fn join_requests(&self, id: i64) -> HttpResult<Vec<JoinRequest>> {
        self.fetch_list(RequestDescriptor::get(partnership_path(id, "requests")))
            .await
    }

    pub async fn approve_request(&self, id: i64, request_id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::post(partnership_path(
            id,
            &format!("requests/{}/approve", request_id),
        )))
        .await
    }

    pub async fn reject_request(&self, id: i64, request_id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::post(partnership_path(
            id,
            &format!("requests/{}/reject", request_id),
        )))
        .await
    }

    pub async fn leave_partnership(&self, id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::post(partnership_path(id, "leave")))
            .await
    }

    pub async fn close_partnership(&self, id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::post(partnership_path(id, "close")))
            .await
    }

    pub async fn partnership_members(&self, id: i64) -> HttpResult<Vec<PartnershipMember>> {
        self.fetch_list(RequestDescriptor::get(partnership_path(id, "members")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockHttpClient;
    use crate::http::AuthenticatedHttpClient;
    use reqwest::{Method, StatusCode};
    use std::sync::Arc;

    #[test]
    fn test_paths() {
        assert_eq!(partnership_path(4, ""), "/api/partnerships/4/");
        assert_eq!(partnership_path(4, "leave"), "/api/partnerships/4/leave/");
        assert_eq!(
            partnership_path(4, "requests/9/approve"),
            "/api/partnerships/4/requests/9/approve/"
        );
    }

    #[tokio::test]
    async fn test_join_and_approve() {
        let mock = MockHttpClient::new();
        let api = ApiClient::new(Arc::new(
            AuthenticatedHttpClient::builder(Arc::new(mock.clone())).build(),
        ));
        mock.enqueue(
            Method::POST,
            "/api/partnerships/4/request_join/",
            StatusCode::CREATED,
            r#"{"id":9,"partnership":4,"user":7,"status":"PENDING"}"#,
        );
        mock.enqueue(Method::POST, "/api/partnerships/4/requests/9/approve/", StatusCode::OK, "{}");
        mock.enqueue(
            Method::GET,
            "/api/partnerships/",
            StatusCode::OK,
            r#"[{"id":4,"city":"Izmir","person_count":7,"status":"OPEN","member_count":2}]"#,
        );

        let request = api.request_join(4).await.unwrap();
        assert_eq!(request.status, "PENDING");
        api.approve_request(4, request.id).await.unwrap();

        let filters = PartnershipFilters {
            city: Some("Izmir".into()),
            show_closed: true,
        };
        let open = api.partnerships(&filters).await.unwrap();
        assert_eq!(open[0].person_count, 7);
        assert_eq!(
            mock.requests_to("/api/partnerships/")[0].query,
            vec![
                ("city".to_string(), "Izmir".to_string()),
                ("show_closed".to_string(), "true".to_string())
            ]
        );
    }
}
