use moka::future::Cache;
use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use crate::{
    error::{AppError, AppResult},
    models::{ItemId, UserId},
};

/// A user's position in embedding space
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// Mean of the embeddings of consumed items; empty for a cold user
    pub embedding: Vec<f64>,
    pub consumed: HashSet<ItemId>,
}

impl UserProfile {
    /// Averages the embeddings of the user's history. Vectors whose dimension
    /// differs from the first one are skipped.
    pub fn from_history(embeddings: &[Vec<f64>], consumed: HashSet<ItemId>) -> Self {
        let Some(first) = embeddings.first() else {
            return Self {
                embedding: Vec::new(),
                consumed,
            };
        };

        let dim = first.len();
        let mut sum = vec![0.0; dim];
        let mut used = 0usize;

        for vector in embeddings.iter().filter(|v| v.len() == dim) {
            for (acc, x) in sum.iter_mut().zip(vector) {
                *acc += x;
            }
            used += 1;
        }

        let embedding = sum.into_iter().map(|x| x / used as f64).collect();

        Self {
            embedding,
            consumed,
        }
    }

    pub fn is_cold(&self) -> bool {
        self.embedding.is_empty()
    }
}

/// Precomputed item vectors, shared by every user's scoring pass
pub type ItemVectors = Arc<Vec<(ItemId, Vec<f64>)>>;

/// Bounded, expiring cache of model artifacts
///
/// Holds user profiles, keyed by user, and the item vector table. Owned by
/// whoever builds the embedding provider and injected into it. Entries are
/// evicted by capacity and by time-to-live.
#[derive(Clone)]
pub struct ModelCache {
    profiles: Cache<UserId, Arc<UserProfile>>,
    item_vectors: Cache<(), ItemVectors>,
}

impl ModelCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let profiles = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        let item_vectors = Cache::builder().max_capacity(1).time_to_live(ttl).build();

        Self {
            profiles,
            item_vectors,
        }
    }

    /// Returns the cached profile or runs `load` once to build it.
    /// Concurrent callers for the same user share one load. Failed loads are
    /// not cached.
    pub async fn get_or_load<F>(&self, user_id: UserId, load: F) -> AppResult<Arc<UserProfile>>
    where
        F: Future<Output = AppResult<UserProfile>>,
    {
        self.profiles
            .try_get_with(user_id, async move { load.await.map(Arc::new) })
            .await
            .map_err(|e: Arc<AppError>| AppError::Internal(format!("Profile load failed: {}", e)))
    }

    /// Returns the cached item vectors or runs `load` once to fetch them
    pub async fn get_or_load_vectors<F>(&self, load: F) -> AppResult<ItemVectors>
    where
        F: Future<Output = AppResult<Vec<(ItemId, Vec<f64>)>>>,
    {
        self.item_vectors
            .try_get_with((), async move { load.await.map(Arc::new) })
            .await
            .map_err(|e: Arc<AppError>| {
                AppError::Internal(format!("Item vector load failed: {}", e))
            })
    }

    #[cfg(test)]
    async fn invalidate(&self, user_id: &UserId) {
        self.profiles.invalidate(user_id).await;
    }

    #[cfg(test)]
    async fn contains(&self, user_id: &UserId) -> bool {
        self.profiles.get(user_id).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn profile() -> UserProfile {
        UserProfile::from_history(&[vec![1.0, 0.0]], HashSet::new())
    }

    #[test]
    fn test_profile_is_mean_of_history() {
        let item = Uuid::new_v4();
        let profile = UserProfile::from_history(
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![9.0]],
            HashSet::from([item]),
        );

        assert_eq!(profile.embedding, vec![2.0, 3.0]);
        assert!(profile.consumed.contains(&item));
        assert!(!profile.is_cold());
    }

    #[test]
    fn test_empty_history_is_cold() {
        let profile = UserProfile::from_history(&[], HashSet::new());
        assert!(profile.is_cold());
    }

    #[tokio::test]
    async fn test_loads_once_per_user() {
        let cache = ModelCache::new(10, Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let user = Uuid::new_v4();

        for _ in 0..3 {
            let loaded = cache
                .get_or_load(user, async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(profile())
                })
                .await
                .unwrap();
            assert_eq!(*loaded, profile());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&user).await);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = ModelCache::new(10, Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let user = Uuid::new_v4();

        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(profile())
        };

        assert_ok!(cache.get_or_load(user, load()).await);
        cache.invalidate(&user).await;
        assert_ok!(cache.get_or_load(user, load()).await);

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = ModelCache::new(10, Duration::from_secs(60));
        let user = Uuid::new_v4();

        let result = cache
            .get_or_load(user, async {
                Err(AppError::Internal("database unavailable".to_string()))
            })
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!cache.contains(&user).await);
    }

    #[tokio::test]
    async fn test_item_vectors_load_once() {
        let cache = ModelCache::new(10, Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let item = Uuid::new_v4();

        for _ in 0..3 {
            let vectors = cache
                .get_or_load_vectors(async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![(item, vec![1.0, 0.0])])
                })
                .await
                .unwrap();
            assert_eq!(vectors.len(), 1);
            assert_eq!(vectors[0].0, item);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = ModelCache::new(10, Duration::from_millis(30));
        let user = Uuid::new_v4();

        cache.get_or_load(user, async { Ok(profile()) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!cache.contains(&user).await);
    }
}
