use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_STRATEGY: &str = "default";

/// Retriever and ranker strategy names configured for a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PipelineConfig {
    pub pipeline_id: Uuid,
    pub retriever_strategy: String,
    pub ranker_strategy: String,
}

impl PipelineConfig {
    /// The pipeline every fresh store is seeded with
    pub fn default_pipeline() -> Self {
        Self {
            pipeline_id: Uuid::nil(),
            retriever_strategy: DEFAULT_STRATEGY.to_string(),
            ranker_strategy: DEFAULT_STRATEGY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipelineRequest {
    #[serde(default = "default_strategy")]
    pub retriever_strategy: String,
    #[serde(default = "default_strategy")]
    pub ranker_strategy: String,
}

pub(crate) fn default_strategy() -> String {
    DEFAULT_STRATEGY.to_string()
}
