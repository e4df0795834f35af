//! Score providers
//!
//! Each provider turns one signal (collaborative, content, embedding, graph)
//! into a score map for the requesting user. Providers share no state and
//! run concurrently; the pipeline waits for all of them before aggregating.
use futures::future::join_all;
use std::{sync::Arc, time::Duration};

use crate::{
    error::{AppError, AppResult},
    models::{ScoreContext, ScoreMap, Signal},
};

pub mod collaborative;
pub mod content;
pub mod embedding;
pub mod graph;

pub use collaborative::CollaborativeProvider;
pub use content::ContentProvider;
pub use embedding::EmbeddingProvider;
pub use graph::GraphProvider;

/// A source of per-item affinity scores for one signal
///
/// "No data" is an empty map, not an error. Errors are reserved for
/// infrastructure failures, which the gather turns into an empty map.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScoreProvider: Send + Sync {
    async fn compute(&self, context: &ScoreContext) -> AppResult<ScoreMap>;

    fn signal(&self) -> Signal;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Runs every provider concurrently and waits for all of them
///
/// The result has one map per provider, in provider order. A provider that
/// fails or misses `timeout` contributes an empty map.
pub async fn gather_scores(
    providers: &[Arc<dyn ScoreProvider>],
    context: &ScoreContext,
    timeout: Duration,
) -> Vec<ScoreMap> {
    let tasks = providers.iter().map(|provider| async move {
        let outcome = match tokio::time::timeout(timeout, provider.compute(context)).await {
            Ok(Ok(scores)) => Ok(scores),
            Ok(Err(e)) => Err(AppError::ProviderDegraded {
                provider: provider.name(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AppError::ProviderDegraded {
                provider: provider.name(),
                reason: format!("timed out after {}ms", timeout.as_millis()),
            }),
        };

        match outcome {
            Ok(scores) => {
                tracing::debug!(
                    provider = provider.name(),
                    signal = %provider.signal(),
                    items = scores.len(),
                    "Provider scores computed"
                );
                scores
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    signal = %provider.signal(),
                    user_id = %context.user_id,
                    "Using empty scores for degraded provider"
                );
                ScoreMap::new()
            }
        }
    });

    join_all(tasks).await
}
