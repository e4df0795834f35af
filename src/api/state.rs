use std::{sync::Arc, time::Duration};

use crate::services::{providers::ScoreProvider, stores::MemoryStore, RecommendationService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommendations: Arc<RecommendationService>,
}

impl AppState {
    pub fn new(recommendations: RecommendationService) -> Self {
        Self {
            recommendations: Arc::new(recommendations),
        }
    }

    /// State backed entirely by one in-memory store, which also supplies the
    /// collaborative signal. Extra providers are gathered alongside it.
    pub fn in_memory(
        store: Arc<MemoryStore>,
        extra_providers: Vec<Arc<dyn ScoreProvider>>,
        provider_timeout: Duration,
    ) -> Self {
        let mut providers: Vec<Arc<dyn ScoreProvider>> = vec![store.clone()];
        providers.extend(extra_providers);

        Self::new(RecommendationService::new(
            store.clone(),
            store.clone(),
            store,
            providers,
            provider_timeout,
        ))
    }
}
