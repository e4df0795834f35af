use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{
        CreatePipelineRequest, ItemId, PipelineConfig, RandomRecommendationRequest,
        RecommendationRecord, RecommendationRequest, RecommendationResponse, TrendsRequest,
    },
    services::formatter,
};

use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Hybrid recommendations
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        pipeline_id = %request.pipeline_id,
        k = request.k,
        promoted = request.promoted_items.len(),
        excluded = request.excluded_items.len(),
        "Processing recommendation request"
    );

    let mut rng = StdRng::from_entropy();
    let response = state.recommendations.recommend(&request, &mut rng).await?;

    Ok(Json(response))
}

/// Trending items over a time window
pub async fn trends(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<TrendsRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        pipeline_id = %request.base.pipeline_id,
        time_period = request.time_period,
        "Processing trends request"
    );

    let mut rng = StdRng::from_entropy();
    let response = state.recommendations.trends(&request, &mut rng).await?;

    Ok(Json(response))
}

/// Random catalog sample
pub async fn random_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RandomRecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        pipeline_id = %request.pipeline_id,
        k = request.k,
        "Processing random recommendation request"
    );

    let mut rng = StdRng::from_entropy();
    let response = state.recommendations.random(&request, &mut rng).await?;

    Ok(Json(response))
}

/// Single enriched item
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> AppResult<Json<RecommendationRecord>> {
    let record = formatter::format_one(item_id, state.recommendations.metadata()).await?;
    Ok(Json(record))
}

pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(pipeline_id): Path<Uuid>,
) -> AppResult<Json<PipelineConfig>> {
    state
        .recommendations
        .pipelines()
        .get_pipeline(pipeline_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Pipeline {} not found", pipeline_id)))
}

pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(request): Json<CreatePipelineRequest>,
) -> AppResult<(StatusCode, Json<PipelineConfig>)> {
    if request.retriever_strategy.trim().is_empty() || request.ranker_strategy.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Strategy names must not be empty".to_string(),
        ));
    }

    let config = state
        .recommendations
        .pipelines()
        .create_pipeline(&request.retriever_strategy, &request.ranker_strategy)
        .await?;

    tracing::info!(pipeline_id = %config.pipeline_id, "Created pipeline");

    Ok((StatusCode::CREATED, Json(config)))
}
