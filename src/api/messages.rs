use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{decimal, ApiClient};
use crate::error::HttpResult;
use crate::http::RequestDescriptor;

/// The listing a conversation is about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: i64,
    pub animal_type: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub price: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub listing: Option<i64>,
    #[serde(default)]
    pub listing_details: Option<ListingSummary>,
    pub buyer: i64,
    #[serde(default)]
    pub buyer_email: Option<String>,
    pub seller: i64,
    #[serde(default)]
    pub seller_email: Option<String>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation: i64,
    #[serde(default)]
    pub sender: Option<i64>,
    #[serde(default)]
    pub sender_email: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub async fn conversations(&self) -> HttpResult<Vec<Conversation>> {
        self.fetch_list(RequestDescriptor::get("/api/messages/conversations/"))
            .await
    }

    pub async fn conversation_messages(&self, conversation: i64) -> HttpResult<Vec<Message>> {
        self.fetch_list(
            RequestDescriptor::get("/api/messages/").query("conversation", conversation.to_string()),
        )
        .await
    }

    pub async fn send_message(&self, conversation: i64, content: &str) -> HttpResult<Message> {
        self.fetch(
            RequestDescriptor::post("/api/messages/")
                .json_value(json!({ "conversation": conversation, "content": content })),
        )
        .await
    }

    pub async fn mark_conversation_read(&self, conversation: i64) -> HttpResult<()> {
        self.execute(RequestDescriptor::post(format!(
            "/api/messages/conversations/{}/mark_all_read/",
            conversation
        )))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockHttpClient;
    use crate::http::{AuthenticatedHttpClient, RequestBody};
    use reqwest::{Method, StatusCode};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_conversation_flow() {
        let mock = MockHttpClient::new();
        let api = ApiClient::new(Arc::new(
            AuthenticatedHttpClient::builder(Arc::new(mock.clone())).build(),
        ));

        mock.enqueue(
            Method::GET,
            "/api/messages/conversations/",
            StatusCode::OK,
            r#"[{"id":3,"listing":5,"listing_details":{"id":5,"animal_type":"cattle","price":"85000.00"},"buyer":7,"seller":2}]"#,
        );
        mock.enqueue(
            Method::POST,
            "/api/messages/",
            StatusCode::CREATED,
            r#"{"id":40,"conversation":3,"sender":7,"content":"Is it still available?"}"#,
        );
        mock.enqueue(Method::POST, "/api/messages/conversations/3/mark_all_read/", StatusCode::OK, "{}");

        let conversations = api.conversations().await.unwrap();
        assert_eq!(conversations[0].listing_details.as_ref().map(|l| l.id), Some(5));

        let message = api.send_message(3, "Is it still available?").await.unwrap();
        assert_eq!(message.conversation, 3);
        assert_eq!(
            mock.requests_to("/api/messages/")[0].body,
            RequestBody::Json(json!({"conversation": 3, "content": "Is it still available?"}))
        );

        api.mark_conversation_read(3).await.unwrap();
        assert_eq!(mock.count("/api/messages/conversations/3/mark_all_read/"), 1);
    }
}
