use chrono::{Duration as ChronoDuration, Utc};
use rand::{seq::SliceRandom, Rng};
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use uuid::Uuid;

use super::{
    aggregation, exploration, formatter,
    providers::{gather_scores, ScoreProvider},
    promotion,
    stores::{MetadataStore, PipelineStore, TrendSource},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        ItemId, PipelineConfig, RandomRecommendationRequest, RankedItem, RecommendationRecord,
        RecommendationRequest, RecommendationResponse, ScoreContext, TrendsRequest,
    },
};

/// Request orchestration: validate, score, aggregate, explore, override, format
///
/// Holds no per-request state, so one instance serves every request.
pub struct RecommendationService {
    pipelines: Arc<dyn PipelineStore>,
    metadata: Arc<dyn MetadataStore>,
    trends: Arc<dyn TrendSource>,
    providers: Vec<Arc<dyn ScoreProvider>>,
    provider_timeout: Duration,
}

impl RecommendationService {
    pub fn new(
        pipelines: Arc<dyn PipelineStore>,
        metadata: Arc<dyn MetadataStore>,
        trends: Arc<dyn TrendSource>,
        providers: Vec<Arc<dyn ScoreProvider>>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            pipelines,
            metadata,
            trends,
            providers,
            provider_timeout,
        }
    }

    pub fn pipelines(&self) -> &dyn PipelineStore {
        self.pipelines.as_ref()
    }

    pub fn metadata(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    /// Looks up a pipeline and checks the requested strategies against it
    async fn resolve_pipeline(
        &self,
        pipeline_id: Uuid,
        retriever_strategy: &str,
        ranker_strategy: &str,
    ) -> AppResult<PipelineConfig> {
        let config = self
            .pipelines
            .get_pipeline(pipeline_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pipeline {} not found", pipeline_id)))?;

        if config.retriever_strategy != retriever_strategy {
            return Err(AppError::InvalidConfiguration(format!(
                "Invalid retriever strategy '{}' for pipeline {}",
                retriever_strategy, pipeline_id
            )));
        }
        if config.ranker_strategy != ranker_strategy {
            return Err(AppError::InvalidConfiguration(format!(
                "Invalid ranker strategy '{}' for pipeline {}",
                ranker_strategy, pipeline_id
            )));
        }

        Ok(config)
    }

    /// Hybrid recommendations from every score provider
    pub async fn recommend<R>(
        &self,
        request: &RecommendationRequest,
        rng: &mut R,
    ) -> AppResult<RecommendationResponse>
    where
        R: Rng + Send + ?Sized,
    {
        let start = Instant::now();
        request.validate()?;
        self.resolve_pipeline(
            request.pipeline_id,
            &request.retriever_strategy,
            &request.ranker_strategy,
        )
        .await?;

        let context = ScoreContext {
            user_id: request.user_id,
            item_id: request.item_id,
        };
        let score_maps = gather_scores(&self.providers, &context, self.provider_timeout).await;
        let ranked = aggregation::aggregate(&score_maps, request.k);

        tracing::info!(
            pipeline_id = %request.pipeline_id,
            user_id = %request.user_id,
            providers = self.providers.len(),
            non_empty = score_maps.iter().filter(|m| !m.is_empty()).count(),
            ranked = ranked.len(),
            "Aggregated hybrid scores"
        );

        let results = self
            .finish(
                ranked,
                request.exploration_factor,
                &request.promoted_items,
                &request.excluded_items,
                request.k,
                request.detailed_output,
                rng,
            )
            .await?;

        tracing::info!(
            results = results.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Recommendations ready"
        );

        Ok(RecommendationResponse { results })
    }

    /// Items ranked purely by interaction count within the trend window
    pub async fn trends<R>(
        &self,
        request: &TrendsRequest,
        rng: &mut R,
    ) -> AppResult<RecommendationResponse>
    where
        R: Rng + Send + ?Sized,
    {
        request.validate()?;
        let base = &request.base;
        self.resolve_pipeline(base.pipeline_id, &base.retriever_strategy, &base.ranker_strategy)
            .await?;

        let until = Utc::now();
        let since = until - ChronoDuration::seconds(request.time_period as i64);
        let ranked = self.trends.trending(since, until, base.k).await?;

        tracing::info!(
            pipeline_id = %base.pipeline_id,
            time_period = request.time_period,
            trending = ranked.len(),
            "Fetched trending items"
        );

        let results = self
            .finish(
                ranked,
                base.exploration_factor,
                &base.promoted_items,
                &base.excluded_items,
                base.k,
                base.detailed_output,
                rng,
            )
            .await?;

        Ok(RecommendationResponse { results })
    }

    /// A uniformly random sample of the catalog, with promotions and exclusions applied
    pub async fn random<R>(
        &self,
        request: &RandomRecommendationRequest,
        rng: &mut R,
    ) -> AppResult<RecommendationResponse>
    where
        R: Rng + Send + ?Sized,
    {
        request.validate()?;
        if self.pipelines.get_pipeline(request.pipeline_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Pipeline {} not found",
                request.pipeline_id
            )));
        }

        let mut pool = self.metadata.catalog().await?;
        pool.shuffle(rng);

        let items = promotion::apply(
            &pool,
            &request.promoted_items,
            &request.excluded_items,
            request.k,
        );

        tracing::info!(
            pipeline_id = %request.pipeline_id,
            catalog = pool.len(),
            results = items.len(),
            "Sampled random recommendations"
        );

        let results = formatter::format(
            &items,
            &HashMap::new(),
            self.metadata.as_ref(),
            request.detailed_output,
        )
        .await?;

        Ok(RecommendationResponse { results })
    }

    /// Shared tail of every ranked flow: exploration, overrides, formatting
    #[allow(clippy::too_many_arguments)]
    async fn finish<R>(
        &self,
        ranked: Vec<RankedItem>,
        exploration_factor: f64,
        promoted: &[ItemId],
        excluded: &[ItemId],
        k: usize,
        detailed: bool,
        rng: &mut R,
    ) -> AppResult<Vec<RecommendationRecord>>
    where
        R: Rng + Send + ?Sized,
    {
        let scores: HashMap<ItemId, f64> = ranked.iter().map(|r| (r.item_id, r.score)).collect();
        let ids: Vec<ItemId> = ranked.into_iter().map(|r| r.item_id).collect();

        let explored = exploration::adjust(ids, exploration_factor, rng);
        let items = promotion::apply(&explored, promoted, excluded, k);

        formatter::format(&items, &scores, self.metadata.as_ref(), detailed).await
    }
}
