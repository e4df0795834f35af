use sqlx::PgPool;
use uuid::Uuid;

use super::ScoreProvider;
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::{ScoreContext, ScoreMap, Signal, UserId},
};

/// Scales a 1-5 rating onto the 0-100 range shared with the other signals
const RATING_SCALE: f64 = 20.0;

/// Crowd signal: how well everybody else rated each item
#[derive(Clone)]
pub struct CollaborativeProvider {
    pool: PgPool,
    cache: Option<Cache>,
    cache_ttl: u64,
}

impl CollaborativeProvider {
    pub fn new(pool: PgPool, cache: Option<Cache>, cache_ttl: u64) -> Self {
        Self {
            pool,
            cache,
            cache_ttl,
        }
    }

    async fn query_scores(&self, user_id: UserId) -> AppResult<ScoreMap> {
        let rows = sqlx::query_as::<_, (Uuid, f64)>(
            r#"
            SELECT item_id, (AVG(rating) * $2)::float8 AS score
            FROM interactions
            WHERE user_id <> $1 AND rating IS NOT NULL
            GROUP BY item_id
            "#,
        )
        .bind(user_id)
        .bind(RATING_SCALE)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl ScoreProvider for CollaborativeProvider {
    async fn compute(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let Some(cache) = &self.cache else {
            return self.query_scores(context.user_id).await;
        };

        let key = CacheKey::Scores {
            signal: Signal::Collaborative,
            user_id: context.user_id,
            item_id: None,
        };

        cached!(cache, key, self.cache_ttl, self.query_scores(context.user_id))
    }

    fn signal(&self) -> Signal {
        Signal::Collaborative
    }

    fn name(&self) -> &'static str {
        "collaborative"
    }
}
