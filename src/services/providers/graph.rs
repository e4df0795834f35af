use sqlx::PgPool;
use uuid::Uuid;

use super::ScoreProvider;
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::{ItemId, ScoreContext, ScoreMap, Signal, UserId},
};

/// Most recent items used as seeds when the request has no seed item
const RECENT_SEEDS: i64 = 5;

/// Co-occurrence signal over the item graph built by
/// [`PgStore::rebuild_item_graph`](crate::services::stores::PgStore::rebuild_item_graph)
#[derive(Clone)]
pub struct GraphProvider {
    pool: PgPool,
    cache: Option<Cache>,
    cache_ttl: u64,
}

impl GraphProvider {
    pub fn new(pool: PgPool, cache: Option<Cache>, cache_ttl: u64) -> Self {
        Self {
            pool,
            cache,
            cache_ttl,
        }
    }

    async fn recent_items(&self, user_id: UserId) -> AppResult<Vec<ItemId>> {
        let items = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT item_id
            FROM interactions
            WHERE user_id = $1
            GROUP BY item_id
            ORDER BY MAX(occurred_at) DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(RECENT_SEEDS)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn query_scores(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let seeds = match context.item_id {
            Some(item_id) => vec![item_id],
            None => self.recent_items(context.user_id).await?,
        };

        if seeds.is_empty() {
            return Ok(ScoreMap::new());
        }

        let edges = sqlx::query_as::<_, (Uuid, Uuid, f64)>(
            r#"
            SELECT source_id, target_id, weight
            FROM item_graph
            WHERE source_id = ANY($1) OR target_id = ANY($1)
            "#,
        )
        .bind(&seeds[..])
        .fetch_all(&self.pool)
        .await?;

        Ok(neighbour_scores(&edges, &seeds))
    }
}

/// Sums edge weights from the seeds to each neighbour
///
/// Edges are stored once with `source_id < target_id`, so a seed may sit at
/// either end. Seeds never score themselves.
fn neighbour_scores(edges: &[(ItemId, ItemId, f64)], seeds: &[ItemId]) -> ScoreMap {
    let mut scores = ScoreMap::new();

    for (source, target, weight) in edges {
        for (from, to) in [(source, target), (target, source)] {
            if seeds.contains(from) && !seeds.contains(to) {
                *scores.entry(*to).or_insert(0.0) += weight;
            }
        }
    }

    scores
}

#[async_trait::async_trait]
impl ScoreProvider for GraphProvider {
    async fn compute(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let Some(cache) = &self.cache else {
            return self.query_scores(context).await;
        };

        let key = CacheKey::Scores {
            signal: Signal::Graph,
            user_id: context.user_id,
            item_id: context.item_id,
        };

        cached!(cache, key, self.cache_ttl, self.query_scores(context))
    }

    fn signal(&self) -> Signal {
        Signal::Graph
    }

    fn name(&self) -> &'static str {
        "graph"
    }
}
