use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{ApiClient, Listing};
use crate::error::HttpResult;
use crate::http::RequestDescriptor;

/// User actions the recommender learns from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    View,
    PhoneClick,
    WhatsappClick,
    Favorite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationQuery {
    pub city: Option<String>,
    pub district: Option<String>,
    pub limit: Option<u32>,
    pub exclude_ids: Vec<i64>,
}

impl RecommendationQuery {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(city) = &self.city {
            query.push(("city".to_string(), city.clone()));
        }
        if let Some(district) = &self.district {
            query.push(("district".to_string(), district.clone()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if !self.exclude_ids.is_empty() {
            let ids: Vec<String> = self.exclude_ids.iter().map(i64::to_string).collect();
            query.push(("exclude_ids".to_string(), ids.join(",")));
        }
        query
    }
}

impl ApiClient {
    pub async fn recommended_listings(
        &self,
        query: &RecommendationQuery,
    ) -> HttpResult<Vec<Listing>> {
        self.fetch_list(
            RequestDescriptor::get("/api/recommendations/listings/").query_pairs(query.to_query()),
        )
        .await
    }

    pub async fn log_interaction(&self, listing: i64, kind: InteractionKind) -> HttpResult<()> {
        self.execute(
            RequestDescriptor::post("/api/recommendations/interactions/")
                .json_value(json!({ "listing": listing, "interaction_type": kind })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_joins_excluded_ids() {
        let query = RecommendationQuery {
            city: Some("Ankara".into()),
            limit: Some(6),
            exclude_ids: vec![5, 7],
            ..Default::default()
        };
        assert_eq!(
            query.to_query(),
            vec![
                ("city".to_string(), "Ankara".to_string()),
                ("limit".to_string(), "6".to_string()),
                ("exclude_ids".to_string(), "5,7".to_string()),
            ]
        );
    }

    #[test]
    fn test_interaction_wire_names() {
        assert_eq!(json!(InteractionKind::WhatsappClick), json!("WHATSAPP_CLICK"));
        assert_eq!(json!(InteractionKind::PhoneClick), json!("PHONE_CLICK"));
    }
}
