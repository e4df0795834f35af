use sqlx::PgPool;
use uuid::Uuid;

use super::ScoreProvider;
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::{ItemId, ScoreContext, ScoreMap, Signal, UserId},
};

/// Score given to every item in the target genre
const GENRE_MATCH_SCORE: f64 = 100.0;

/// Content signal: items sharing the genre of the seed item, or of the
/// genre the user interacts with most
///
/// Items outside the genre are left out of the map, which the aggregator
/// reads the same as a zero score.
#[derive(Clone)]
pub struct ContentProvider {
    pool: PgPool,
    cache: Option<Cache>,
    cache_ttl: u64,
}

impl ContentProvider {
    pub fn new(pool: PgPool, cache: Option<Cache>, cache_ttl: u64) -> Self {
        Self {
            pool,
            cache,
            cache_ttl,
        }
    }

    async fn seed_genre(&self, item_id: ItemId) -> AppResult<Option<String>> {
        let genre = sqlx::query_scalar::<_, Option<String>>(
            "SELECT genre FROM items WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(genre.flatten())
    }

    async fn favourite_genre(&self, user_id: UserId) -> AppResult<Option<String>> {
        let genre = sqlx::query_scalar::<_, String>(
            r#"
            SELECT it.genre
            FROM interactions i
            JOIN items it ON it.item_id = i.item_id
            WHERE i.user_id = $1 AND it.genre IS NOT NULL
            GROUP BY it.genre
            ORDER BY COUNT(*) DESC, it.genre
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(genre)
    }

    async fn query_scores(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let genre = match context.item_id {
            Some(item_id) => self.seed_genre(item_id).await?,
            None => self.favourite_genre(context.user_id).await?,
        };

        // Cold start: unknown seed or no history yet
        let Some(genre) = genre else {
            tracing::debug!(user_id = %context.user_id, "No target genre, content signal empty");
            return Ok(ScoreMap::new());
        };

        let items = sqlx::query_scalar::<_, Uuid>("SELECT item_id FROM items WHERE genre = $1")
            .bind(&genre)
            .fetch_all(&self.pool)
            .await?;

        Ok(items
            .into_iter()
            .map(|item_id| (item_id, GENRE_MATCH_SCORE))
            .collect())
    }
}

#[async_trait::async_trait]
impl ScoreProvider for ContentProvider {
    async fn compute(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let Some(cache) = &self.cache else {
            return self.query_scores(context).await;
        };

        let key = CacheKey::Scores {
            signal: Signal::Content,
            user_id: context.user_id,
            item_id: context.item_id,
        };

        cached!(cache, key, self.cache_ttl, self.query_scores(context))
    }

    fn signal(&self) -> Signal {
        Signal::Content
    }

    fn name(&self) -> &'static str {
        "content"
    }
}
