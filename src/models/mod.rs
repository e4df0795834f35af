use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display};
use uuid::Uuid;

pub mod item;
pub mod pipeline;
pub mod request;

pub use item::{ItemMetadata, RecommendationRecord, RecommendationResponse};
pub use pipeline::{CreatePipelineRequest, PipelineConfig, DEFAULT_STRATEGY};
pub use request::{RandomRecommendationRequest, RecommendationRequest, TrendsRequest};

/// Opaque item identifier. `Uuid` ordering is the deterministic tie-break order.
pub type ItemId = Uuid;

pub type UserId = Uuid;

/// Per-signal mapping of item to affinity score. Scores are unbounded and
/// not normalised across providers.
pub type ScoreMap = HashMap<ItemId, f64>;

/// The scoring signal a provider contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Collaborative,
    Content,
    Embedding,
    Graph,
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Collaborative => write!(f, "collaborative"),
            Signal::Content => write!(f, "content"),
            Signal::Embedding => write!(f, "embedding"),
            Signal::Graph => write!(f, "graph"),
        }
    }
}

/// Everything a score provider may consult for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreContext {
    pub user_id: UserId,
    /// Seed item for content and graph signals
    pub item_id: Option<ItemId>,
}

/// An item together with the score that placed it in the ranked list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedItem {
    pub item_id: ItemId,
    pub score: f64,
}
