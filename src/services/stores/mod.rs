//! Read-side collaborators of the recommendation pipeline
//!
//! The pipeline only ever reads pipelines, item metadata and interaction
//! counts. Two backends implement these traits: Postgres for deployments and
//! an in-process store for local runs and tests.
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{ItemId, ItemMetadata, PipelineConfig, RankedItem},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Resolves pipeline ids to their configured strategies
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PipelineStore: Send + Sync {
    async fn get_pipeline(&self, pipeline_id: Uuid) -> AppResult<Option<PipelineConfig>>;

    async fn create_pipeline(
        &self,
        retriever_strategy: &str,
        ranker_strategy: &str,
    ) -> AppResult<PipelineConfig>;
}

/// Display metadata lookups, batched per response
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Metadata for every known item in `item_ids`. Unknown ids are simply absent.
    async fn lookup_batch(&self, item_ids: &[ItemId]) -> AppResult<HashMap<ItemId, ItemMetadata>>;

    /// Ids of every item in the catalog
    async fn catalog(&self) -> AppResult<Vec<ItemId>>;
}

/// Interaction volume over a time window
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TrendSource: Send + Sync {
    /// Up to `limit` items ordered by interaction count within `[since, until]`,
    /// descending, ties by item id. The score is the interaction count.
    async fn trending(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RankedItem>>;
}

/// Orders `(item, count)` pairs the way every trend source must
pub(crate) fn rank_by_count(mut counts: Vec<(ItemId, i64)>, limit: usize) -> Vec<RankedItem> {
    counts.sort_by(|(a_id, a_count), (b_id, b_count)| b_count.cmp(a_count).then(a_id.cmp(b_id)));
    counts.truncate(limit);
    counts
        .into_iter()
        .map(|(item_id, count)| RankedItem {
            item_id,
            score: count as f64,
        })
        .collect()
}
