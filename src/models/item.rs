use serde::{Deserialize, Serialize};

use super::ItemId;

/// Display metadata for a catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemMetadata {
    pub item_id: ItemId,
    pub title: String,
    pub genre: Option<String>,
    /// Mean historical rating, 0 when the item has never been rated
    pub avg_rating: f64,
    pub interaction_count: i64,
}

/// One entry of a recommendation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub avg_rating: Option<f64>,
    pub interaction_count: i64,
    /// Final aggregate score, only present for detailed output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RecommendationRecord {
    /// Record for an item without metadata, e.g. a promoted item no provider has seen
    pub fn bare(item_id: ItemId) -> Self {
        Self {
            item_id,
            title: None,
            genre: None,
            avg_rating: None,
            interaction_count: 0,
            score: None,
        }
    }
}

impl From<&ItemMetadata> for RecommendationRecord {
    fn from(metadata: &ItemMetadata) -> Self {
        Self {
            item_id: metadata.item_id,
            title: Some(metadata.title.clone()),
            genre: metadata.genre.clone(),
            avg_rating: Some(metadata.avg_rating),
            interaction_count: metadata.interaction_count,
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub results: Vec<RecommendationRecord>,
}
