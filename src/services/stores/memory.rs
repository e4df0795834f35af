use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{rank_by_count, MetadataStore, PipelineStore, TrendSource};
use crate::{
    error::{AppError, AppResult},
    models::{
        ItemId, ItemMetadata, PipelineConfig, RankedItem, ScoreContext, ScoreMap, Signal, UserId,
    },
    services::providers::ScoreProvider,
};

/// Catalog entry held by the in-memory store
#[derive(Debug, Clone)]
struct Item {
    title: String,
    genre: Option<String>,
}

#[derive(Debug, Clone)]
struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    rating: Option<i32>,
    occurred_at: DateTime<Utc>,
}

/// Seed data for a [`MemoryStore`], usually read from a JSON file
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub items: Vec<FixtureItem>,
    #[serde(default)]
    pub interactions: Vec<FixtureInteraction>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureItem {
    pub item_id: ItemId,
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureInteraction {
    pub user_id: UserId,
    pub item_id: ItemId,
    #[serde(default)]
    pub rating: Option<i32>,
    /// Defaults to load time
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    pipelines: HashMap<Uuid, PipelineConfig>,
    items: HashMap<ItemId, Item>,
    interactions: Vec<Interaction>,
}

/// Process-local store for development runs and tests
///
/// Seeded with the default pipeline. Also acts as a collaborative score
/// provider over its own interactions.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let default_pipeline = PipelineConfig::default_pipeline();
        let mut inner = Inner::default();
        inner
            .pipelines
            .insert(default_pipeline.pipeline_id, default_pipeline);

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Adds a catalog item and returns its id
    pub async fn add_item(&self, title: impl Into<String>, genre: Option<&str>) -> ItemId {
        let item_id = Uuid::new_v4();
        let item = Item {
            title: title.into(),
            genre: genre.map(str::to_string),
        };
        self.inner.write().await.items.insert(item_id, item);
        item_id
    }

    /// Loads a fixture in one step. Interactions must reference items that are
    /// in the fixture or already in the store; otherwise nothing is loaded.
    pub async fn load_fixture(&self, fixture: Fixture) -> AppResult<()> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let unknown = fixture.interactions.iter().find(|i| {
            !inner.items.contains_key(&i.item_id)
                && !fixture.items.iter().any(|item| item.item_id == i.item_id)
        });
        if let Some(interaction) = unknown {
            return Err(AppError::InvalidArgument(format!(
                "Fixture interaction references unknown item {}",
                interaction.item_id
            )));
        }

        let (items, interactions) = (fixture.items.len(), fixture.interactions.len());

        for item in fixture.items {
            inner.items.insert(
                item.item_id,
                Item {
                    title: item.title,
                    genre: item.genre,
                },
            );
        }
        inner
            .interactions
            .extend(fixture.interactions.into_iter().map(|i| Interaction {
                user_id: i.user_id,
                item_id: i.item_id,
                rating: i.rating,
                occurred_at: i.occurred_at.unwrap_or(now),
            }));

        tracing::info!(items, interactions, "Loaded memory store fixture");

        Ok(())
    }

    pub async fn record_interaction(
        &self,
        user_id: UserId,
        item_id: ItemId,
        rating: Option<i32>,
        occurred_at: DateTime<Utc>,
    ) {
        self.inner.write().await.interactions.push(Interaction {
            user_id,
            item_id,
            rating,
            occurred_at,
        });
    }
}

#[async_trait::async_trait]
impl PipelineStore for MemoryStore {
    async fn get_pipeline(&self, pipeline_id: Uuid) -> AppResult<Option<PipelineConfig>> {
        Ok(self.inner.read().await.pipelines.get(&pipeline_id).cloned())
    }

    async fn create_pipeline(
        &self,
        retriever_strategy: &str,
        ranker_strategy: &str,
    ) -> AppResult<PipelineConfig> {
        let config = PipelineConfig {
            pipeline_id: Uuid::new_v4(),
            retriever_strategy: retriever_strategy.to_string(),
            ranker_strategy: ranker_strategy.to_string(),
        };
        self.inner
            .write()
            .await
            .pipelines
            .insert(config.pipeline_id, config.clone());
        Ok(config)
    }
}

#[async_trait::async_trait]
impl MetadataStore for MemoryStore {
    async fn lookup_batch(&self, item_ids: &[ItemId]) -> AppResult<HashMap<ItemId, ItemMetadata>> {
        let inner = self.inner.read().await;
        let mut found = HashMap::with_capacity(item_ids.len());

        for item_id in item_ids {
            let Some(item) = inner.items.get(item_id) else {
                continue;
            };

            let history: Vec<&Interaction> = inner
                .interactions
                .iter()
                .filter(|i| i.item_id == *item_id)
                .collect();
            let ratings: Vec<f64> = history
                .iter()
                .filter_map(|i| i.rating.map(f64::from))
                .collect();
            let avg_rating = if ratings.is_empty() {
                0.0
            } else {
                ratings.iter().sum::<f64>() / ratings.len() as f64
            };

            found.insert(
                *item_id,
                ItemMetadata {
                    item_id: *item_id,
                    title: item.title.clone(),
                    genre: item.genre.clone(),
                    avg_rating,
                    interaction_count: history.len() as i64,
                },
            );
        }

        Ok(found)
    }

    async fn catalog(&self) -> AppResult<Vec<ItemId>> {
        let mut ids: Vec<ItemId> = self.inner.read().await.items.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait::async_trait]
impl TrendSource for MemoryStore {
    async fn trending(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RankedItem>> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<ItemId, i64> = HashMap::new();

        for interaction in &inner.interactions {
            if interaction.occurred_at >= since && interaction.occurred_at <= until {
                *counts.entry(interaction.item_id).or_insert(0) += 1;
            }
        }

        Ok(rank_by_count(counts.into_iter().collect(), limit))
    }
}

#[async_trait::async_trait]
impl ScoreProvider for MemoryStore {
    /// Average rating from every other user, scaled by 20
    async fn compute(&self, context: &ScoreContext) -> AppResult<ScoreMap> {
        let inner = self.inner.read().await;
        let mut sums: HashMap<ItemId, (f64, u32)> = HashMap::new();

        for interaction in &inner.interactions {
            if interaction.user_id == context.user_id {
                continue;
            }
            if let Some(rating) = interaction.rating {
                let entry = sums.entry(interaction.item_id).or_insert((0.0, 0));
                entry.0 += f64::from(rating);
                entry.1 += 1;
            }
        }

        Ok(sums
            .into_iter()
            .map(|(item_id, (sum, n))| (item_id, sum / f64::from(n) * 20.0))
            .collect())
    }

    fn signal(&self) -> Signal {
        Signal::Collaborative
    }

    fn name(&self) -> &'static str {
        "memory_collaborative"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_seeded_with_default_pipeline() {
        let store = MemoryStore::new();
        let config = store.get_pipeline(Uuid::nil()).await.unwrap();
        assert_eq!(config, Some(PipelineConfig::default_pipeline()));
        assert_eq!(store.get_pipeline(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_pipeline_is_retrievable() {
        let store = MemoryStore::new();
        let created = store.create_pipeline("graph", "allocated").await.unwrap();
        let fetched = store.get_pipeline(created.pipeline_id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_lookup_batch_aggregates_interactions() {
        let store = MemoryStore::new();
        let movie = store.add_item("Heat", Some("crime")).await;
        let unrated = store.add_item("Ronin", None).await;
        let now = Utc::now();

        store.record_interaction(Uuid::new_v4(), movie, Some(4), now).await;
        store.record_interaction(Uuid::new_v4(), movie, Some(2), now).await;
        store.record_interaction(Uuid::new_v4(), movie, None, now).await;

        let unknown = Uuid::new_v4();
        let found = store
            .lookup_batch(&[movie, unrated, unknown])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[&movie].avg_rating, 3.0);
        assert_eq!(found[&movie].interaction_count, 3);
        assert_eq!(found[&unrated].avg_rating, 0.0);
        assert!(!found.contains_key(&unknown));
    }

    #[tokio::test]
    async fn test_trending_respects_window() {
        let store = MemoryStore::new();
        let fresh = store.add_item("Fresh", None).await;
        let stale = store.add_item("Stale", None).await;
        let now = Utc::now();

        for _ in 0..3 {
            store.record_interaction(Uuid::new_v4(), stale, None, now - Duration::days(30)).await;
        }
        store.record_interaction(Uuid::new_v4(), fresh, None, now - Duration::hours(1)).await;

        let trending = store
            .trending(now - Duration::days(7), now, 10)
            .await
            .unwrap();

        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].item_id, fresh);
        assert_eq!(trending[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_collaborative_scores_exclude_requesting_user() {
        let store = MemoryStore::new();
        let item = store.add_item("Alien", Some("sci-fi")).await;
        let own = store.add_item("Aliens", Some("sci-fi")).await;
        let me = Uuid::new_v4();
        let now = Utc::now();

        store.record_interaction(Uuid::new_v4(), item, Some(5), now).await;
        store.record_interaction(Uuid::new_v4(), item, Some(3), now).await;
        store.record_interaction(me, own, Some(5), now).await;

        let scores = store
            .compute(&ScoreContext {
                user_id: me,
                item_id: None,
            })
            .await
            .unwrap();

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[&item], 80.0);
    }

    #[tokio::test]
    async fn test_load_fixture_seeds_catalog_and_history() {
        let store = MemoryStore::new();
        let (heat, ronin) = (Uuid::new_v4(), Uuid::new_v4());
        let user = Uuid::new_v4();

        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "items": [
                { "item_id": heat, "title": "Heat", "genre": "crime" },
                { "item_id": ronin, "title": "Ronin" }
            ],
            "interactions": [
                { "user_id": user, "item_id": heat, "rating": 5 },
                { "user_id": user, "item_id": ronin, "occurred_at": "2024-01-01T00:00:00Z" }
            ]
        }))
        .unwrap();

        store.load_fixture(fixture).await.unwrap();

        let found = store.lookup_batch(&[heat, ronin]).await.unwrap();
        assert_eq!(found[&heat].avg_rating, 5.0);
        assert_eq!(found[&ronin].genre, None);
        assert_eq!(store.catalog().await.unwrap().len(), 2);

        // Only the interaction without a timestamp is recent
        let now = Utc::now();
        let trending = store.trending(now - Duration::days(1), now, 10).await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].item_id, heat);
    }

    #[tokio::test]
    async fn test_bundled_fixture_loads() {
        let fixture: Fixture =
            serde_json::from_str(include_str!("../../../fixtures/memory_seed.json")).unwrap();
        let store = MemoryStore::new();

        store.load_fixture(fixture).await.unwrap();

        let scores = store
            .compute(&ScoreContext {
                user_id: Uuid::new_v4(),
                item_id: None,
            })
            .await
            .unwrap();
        assert_eq!(store.catalog().await.unwrap().len(), 8);
        assert!(!scores.is_empty());
    }

    #[tokio::test]
    async fn test_load_fixture_rejects_unknown_items() {
        let store = MemoryStore::new();
        let fixture = Fixture {
            items: Vec::new(),
            interactions: vec![FixtureInteraction {
                user_id: Uuid::new_v4(),
                item_id: Uuid::new_v4(),
                rating: Some(3),
                occurred_at: None,
            }],
        };

        let result = store.load_fixture(fixture).await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
        assert!(store.catalog().await.unwrap().is_empty());
    }
}
