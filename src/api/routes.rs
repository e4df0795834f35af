use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Recommendations
        .route("/recommendations", post(handlers::recommend))
        .route("/trends", post(handlers::trends))
        .route("/random-recommendations", post(handlers::random_recommendations))
        // Catalog
        .route("/items/:item_id", get(handlers::get_item))
        // Pipelines
        .route("/pipelines", post(handlers::create_pipeline))
        .route("/pipelines/:pipeline_id", get(handlers::get_pipeline))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
