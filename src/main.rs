use std::sync::Arc;

use hybrid_recs::{
    api::{create_router, AppState},
    config::{Config, StoreBackend},
    db::{create_pool, create_redis_client, Cache, CacheWriterHandle},
    services::{
        model_cache::ModelCache,
        providers::{
            CollaborativeProvider, ContentProvider, EmbeddingProvider, GraphProvider,
            ScoreProvider,
        },
        stores::{memory::Fixture, MemoryStore, PgStore},
        RecommendationService,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hybrid_recs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (state, cache_writer) = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            match &config.memory_seed_path {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path).await?;
                    let fixture: Fixture = serde_json::from_str(&json)?;
                    store.load_fixture(fixture).await?;
                }
                None => tracing::warn!("MEMORY_SEED_PATH not set, catalog starts empty"),
            }
            let state = AppState::in_memory(store, Vec::new(), config.provider_timeout());
            (state, None)
        }
        StoreBackend::Postgres => build_postgres_state(&config).await?,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, backend = ?config.store_backend, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn build_postgres_state(
    config: &Config,
) -> anyhow::Result<(AppState, Option<CacheWriterHandle>)> {
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;

    // Redis is optional: without it providers compute every request
    let (cache, cache_writer) = match connect_cache(&config.redis_url).await {
        Ok((cache, handle)) => (Some(cache), Some(handle)),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, score caching disabled");
            (None, None)
        }
    };

    let store = Arc::new(PgStore::new(pool.clone()));

    if config.rebuild_graph_on_start {
        let edges = store.rebuild_item_graph().await?;
        tracing::info!(edges, "Item graph rebuilt");
    }

    let ttl = config.score_cache_ttl_secs;
    let profiles = ModelCache::new(config.model_cache_capacity, config.model_cache_ttl());

    let providers: Vec<Arc<dyn ScoreProvider>> = vec![
        Arc::new(CollaborativeProvider::new(pool.clone(), cache.clone(), ttl)),
        Arc::new(ContentProvider::new(pool.clone(), cache.clone(), ttl)),
        Arc::new(EmbeddingProvider::new(
            pool.clone(),
            profiles,
            config.embedding_candidates,
        )),
        Arc::new(GraphProvider::new(pool, cache, ttl)),
    ];

    let service = RecommendationService::new(
        store.clone(),
        store.clone(),
        store,
        providers,
        config.provider_timeout(),
    );

    Ok((AppState::new(service), cache_writer))
}

async fn connect_cache(redis_url: &str) -> anyhow::Result<(Cache, CacheWriterHandle)> {
    let client = create_redis_client(redis_url)?;
    let connected = Cache::connect(client).await?;
    Ok(connected)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
