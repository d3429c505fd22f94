use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::HttpResult;
use crate::http::RequestDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Free-form payload, e.g. the ids the notification links to
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub async fn notifications(&self) -> HttpResult<Vec<Notification>> {
        self.fetch_list(RequestDescriptor::get("/api/notifications/"))
            .await
    }

    pub async fn mark_notification_read(&self, id: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::post(format!(
            "/api/notifications/{}/mark_as_read/",
            id
        )))
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> HttpResult<()> {
        self.execute(RequestDescriptor::post("/api/notifications/mark_all_read/"))
            .await
    }
}
