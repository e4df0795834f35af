use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::{rank_by_count, MetadataStore, PipelineStore, TrendSource};
use crate::{
    error::AppResult,
    models::{ItemId, ItemMetadata, PipelineConfig, RankedItem},
};

/// Co-occurrence edges at or below this Jaccard weight are dropped
const MIN_EDGE_WEIGHT: f64 = 0.1;

/// Postgres-backed pipeline, metadata and trend store. All queries bind their
/// parameters; identifiers never reach the SQL text.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recomputes the item co-occurrence graph from interactions
    ///
    /// Two items are linked when the same user interacted with both. The edge
    /// weight is the Jaccard index of their user sets.
    pub async fn rebuild_item_graph(&self) -> AppResult<u64> {
        let pairs = sqlx::query_as::<_, CoOccurrence>(
            r#"
            WITH item_users AS (
                SELECT DISTINCT item_id, user_id FROM interactions
            ),
            item_counts AS (
                SELECT item_id, COUNT(*) AS users FROM item_users GROUP BY item_id
            )
            SELECT a.item_id AS source_id,
                   b.item_id AS target_id,
                   COUNT(*) AS overlap,
                   MAX(ca.users) AS source_users,
                   MAX(cb.users) AS target_users
            FROM item_users a
            JOIN item_users b ON a.user_id = b.user_id AND a.item_id < b.item_id
            JOIN item_counts ca ON ca.item_id = a.item_id
            JOIN item_counts cb ON cb.item_id = b.item_id
            GROUP BY a.item_id, b.item_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let edges = weighted_edges(&pairs);
        let (sources, (targets, weights)): (Vec<Uuid>, (Vec<Uuid>, Vec<f64>)) = edges
            .into_iter()
            .map(|(source, target, weight)| (source, (target, weight)))
            .unzip();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM item_graph").execute(&mut *tx).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO item_graph (source_id, target_id, weight)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::float8[])
            "#,
        )
        .bind(&sources)
        .bind(&targets)
        .bind(&weights)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::info!(
            pairs = pairs.len(),
            edges = inserted,
            "Rebuilt item co-occurrence graph"
        );

        Ok(inserted)
    }
}

/// Users shared by an item pair, with each item's distinct user count
#[derive(Debug, Clone, sqlx::FromRow)]
struct CoOccurrence {
    source_id: ItemId,
    target_id: ItemId,
    overlap: i64,
    source_users: i64,
    target_users: i64,
}

/// Size of the intersection over size of the union of two user sets
fn jaccard(overlap: i64, a: i64, b: i64) -> f64 {
    let union = a + b - overlap;
    if union <= 0 {
        return 0.0;
    }
    overlap as f64 / union as f64
}

/// Edges whose Jaccard weight clears [`MIN_EDGE_WEIGHT`]
fn weighted_edges(pairs: &[CoOccurrence]) -> Vec<(ItemId, ItemId, f64)> {
    pairs
        .iter()
        .map(|p| {
            let weight = jaccard(p.overlap, p.source_users, p.target_users);
            (p.source_id, p.target_id, weight)
        })
        .filter(|(_, _, weight)| *weight > MIN_EDGE_WEIGHT)
        .collect()
}

#[async_trait::async_trait]
impl PipelineStore for PgStore {
    async fn get_pipeline(&self, pipeline_id: Uuid) -> AppResult<Option<PipelineConfig>> {
        let config = sqlx::query_as::<_, PipelineConfig>(
            r#"
            SELECT pipeline_id, retriever_strategy, ranker_strategy
            FROM pipelines
            WHERE pipeline_id = $1
            "#,
        )
        .bind(pipeline_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn create_pipeline(
        &self,
        retriever_strategy: &str,
        ranker_strategy: &str,
    ) -> AppResult<PipelineConfig> {
        let config = sqlx::query_as::<_, PipelineConfig>(
            r#"
            INSERT INTO pipelines (pipeline_id, retriever_strategy, ranker_strategy)
            VALUES ($1, $2, $3)
            RETURNING pipeline_id, retriever_strategy, ranker_strategy
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(retriever_strategy)
        .bind(ranker_strategy)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }
}

#[async_trait::async_trait]
impl MetadataStore for PgStore {
    async fn lookup_batch(&self, item_ids: &[ItemId]) -> AppResult<HashMap<ItemId, ItemMetadata>> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ItemMetadata>(
            r#"
            SELECT i.item_id,
                   i.title,
                   i.genre,
                   COALESCE(AVG(r.rating), 0)::float8 AS avg_rating,
                   COUNT(r.interaction_id) AS interaction_count
            FROM items i
            LEFT JOIN interactions r ON r.item_id = i.item_id
            WHERE i.item_id = ANY($1)
            GROUP BY i.item_id, i.title, i.genre
            "#,
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|m| (m.item_id, m)).collect())
    }

    async fn catalog(&self) -> AppResult<Vec<ItemId>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT item_id FROM items ORDER BY item_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}

#[async_trait::async_trait]
impl TrendSource for PgStore {
    async fn trending(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RankedItem>> {
        let counts = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT item_id, COUNT(*) AS interaction_count
            FROM interactions
            WHERE occurred_at BETWEEN $1 AND $2
            GROUP BY item_id
            ORDER BY interaction_count DESC, item_id
            LIMIT $3
            "#,
        )
        .bind(since)
        .bind(until)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rank_by_count(counts, limit))
    }
}
