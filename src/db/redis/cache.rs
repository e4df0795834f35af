use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::fmt::Display;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::{Signal, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Score map of one signal for a user and optional seed item
    Scores {
        signal: Signal,
        user_id: UserId,
        item_id: Option<Uuid>,
    },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Scores {
                signal,
                user_id,
                item_id: Some(item_id),
            } => write!(f, "scores:{}:{}:{}", signal, user_id, item_id),
            CacheKey::Scores {
                signal,
                user_id,
                item_id: None,
            } => write!(f, "scores:{}:{}", signal, user_id),
        }
    }
}

/// Opens a Redis client. No connection is made until the cache connects.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// A serialized value waiting to be written
struct PendingWrite {
    key: String,
    json: String,
    ttl_secs: u64,
}

/// JSON cache over Redis with write-behind
///
/// Reads go straight to Redis. Writes are queued and applied by a background
/// task so a slow Redis never delays a response.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    write_tx: mpsc::UnboundedSender<PendingWrite>,
}

/// Owns the background writer; `shutdown` flushes queued writes and joins it
pub struct CacheWriterHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Connects to Redis and starts the writer task
    pub async fn connect(client: Client) -> AppResult<(Self, CacheWriterHandle)> {
        let conn = ConnectionManager::new(client).await?;
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(Self::run_writer(conn.clone(), write_rx, shutdown_rx));

        Ok((
            Self { conn, write_tx },
            CacheWriterHandle { shutdown_tx, task },
        ))
    }

    async fn run_writer(
        conn: ConnectionManager,
        mut write_rx: mpsc::UnboundedReceiver<PendingWrite>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        tracing::info!("Cache writer started");
        let mut failed: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                write = write_rx.recv() => match write {
                    Some(write) => {
                        if let Err(e) = Self::apply(conn.clone(), write).await {
                            failed += 1;
                            tracing::warn!(error = %e, failed, "Cache write failed");
                        }
                    }
                    None => break,
                },
            }
        }

        // Flush whatever was queued before shutdown
        write_rx.close();
        let mut flushed = 0;
        while let Some(write) = write_rx.recv().await {
            if let Err(e) = Self::apply(conn.clone(), write).await {
                tracing::warn!(error = %e, "Cache write failed during shutdown flush");
            } else {
                flushed += 1;
            }
        }

        tracing::info!(flushed, failed, "Cache writer stopped");
    }

    async fn apply(mut conn: ConnectionManager, write: PendingWrite) -> AppResult<()> {
        let _: () = conn.set_ex(write.key, write.json, write.ttl_secs).await?;
        Ok(())
    }

    /// Reads and deserializes a cached value; `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))
            })
            .transpose()
    }

    /// Queues a write and returns immediately
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl_secs: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            json,
            ttl_secs,
        };

        if self.write_tx.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped, dropping write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_scores_with_seed() {
        let user = Uuid::nil();
        let item = Uuid::from_u128(1);
        let key = CacheKey::Scores {
            signal: Signal::Content,
            user_id: user,
            item_id: Some(item),
        };
        assert_eq!(
            format!("{}", key),
            "scores:content:00000000-0000-0000-0000-000000000000:00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn test_cache_key_display_scores_without_seed() {
        let key = CacheKey::Scores {
            signal: Signal::Collaborative,
            user_id: Uuid::nil(),
            item_id: None,
        };
        assert_eq!(
            format!("{}", key),
            "scores:collaborative:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_set_in_background_writes_score_map() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::connect(client.clone()).await.unwrap();

        let key = CacheKey::Scores {
            signal: Signal::Graph,
            user_id: Uuid::new_v4(),
            item_id: None,
        };
        let value: crate::models::ScoreMap = [(Uuid::new_v4(), 12.5)].into_iter().collect();

        cache.set_in_background(&key, &value, 60);
        handle.shutdown().await;

        let retrieved: Option<crate::models::ScoreMap> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(format!("{}", key)).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_cache_miss() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, _handle) = Cache::connect(client).await.unwrap();

        let key = CacheKey::Scores {
            signal: Signal::Embedding,
            user_id: Uuid::new_v4(),
            item_id: None,
        };
        let retrieved: Option<crate::models::ScoreMap> = cache.get_from_cache(&key).await.unwrap();

        assert_eq!(retrieved, None);
    }
}
