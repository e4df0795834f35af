use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::ScoreProvider;
use crate::{
    error::AppResult,
    models::{ItemId, ScoreContext, ScoreMap, Signal, UserId},
    services::model_cache::{ModelCache, UserProfile},
};

/// Cosine similarity is scaled onto the 0-100 range shared with the other signals
const SIMILARITY_SCALE: f64 = 100.0;

/// Embedding signal over precomputed item vectors
///
/// Vectors are produced offline and stored in `item_embeddings`. A user is
/// represented by the mean of the vectors of items they interacted with.
/// Profiles and the vector table both live in the injected [`ModelCache`].
#[derive(Clone)]
pub struct EmbeddingProvider {
    pool: PgPool,
    model_cache: ModelCache,
    candidates: usize,
}

impl EmbeddingProvider {
    pub fn new(pool: PgPool, model_cache: ModelCache, candidates: usize) -> Self {
        Self {
            pool,
            model_cache,
            candidates,
        }
    }

    async fn load_profile(&self, user_id: UserId) -> AppResult<UserProfile> {
        let consumed: HashSet<ItemId> = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT item_id FROM interactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let embeddings = sqlx::query_scalar::<_, Vec<f64>>(
            r#"
            SELECT e.embedding
            FROM item_embeddings e
            WHERE e.item_id IN (SELECT item_id FROM interactions WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %user_id,
            consumed = consumed.len(),
            embedded = embeddings.len(),
            "Built user profile"
        );

        Ok(UserProfile::from_history(&embeddings, consumed))
    }

    /// Full vector table; cached so scoring does not rescan it per request
    async fn load_vectors(&self) -> AppResult<Vec<(ItemId, Vec<f64>)>> {
        let vectors = sqlx::query_as::<_, (Uuid, Vec<f64>)>(
            "SELECT item_id, embedding FROM item_embeddings",
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(items = vectors.len(), "Loaded item vectors");

        Ok(vectors)
    }
}

#[async_trait::async_trait]
impl ScoreProvider for EmbeddingProvider {
    async fn compute(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let profile = self
            .model_cache
            .get_or_load(context.user_id, self.load_profile(context.user_id))
            .await?;

        if profile.is_cold() {
            return Ok(ScoreMap::new());
        }

        let vectors = self.model_cache.get_or_load_vectors(self.load_vectors()).await?;

        Ok(score_candidates(&profile, &vectors, self.candidates))
    }

    fn signal(&self) -> Signal {
        Signal::Embedding
    }

    fn name(&self) -> &'static str {
        "embedding"
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a * norm_b))
}

/// Scores unconsumed candidates against the profile and keeps the best `limit`
fn score_candidates(
    profile: &UserProfile,
    candidates: &[(ItemId, Vec<f64>)],
    limit: usize,
) -> ScoreMap {
    let mut scored: Vec<(ItemId, f64)> = candidates
        .iter()
        .filter(|(item_id, _)| !profile.consumed.contains(item_id))
        .filter_map(|(item_id, vector)| {
            cosine_similarity(&profile.embedding, vector)
                .map(|similarity| (*item_id, similarity * SIMILARITY_SCALE))
        })
        .collect();

    scored.sort_by(|(a_id, a), (b_id, b)| {
        b.partial_cmp(a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a_id.cmp(b_id))
    });
    scored.truncate(limit);

    scored.into_iter().collect()
}
