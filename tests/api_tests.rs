use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use hybrid_recs::{
    api::{create_router, AppState},
    services::stores::MemoryStore,
};

struct Catalog {
    heat: Uuid,
    ronin: Uuid,
    thief: Uuid,
}

fn create_test_server(store: Arc<MemoryStore>) -> TestServer {
    let state = AppState::in_memory(store, Vec::new(), Duration::from_secs(1));
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

/// Three items; Heat is rated higher and interacted with more than Ronin,
/// Thief has no interactions at all
async fn seeded_store() -> (Arc<MemoryStore>, Catalog) {
    let store = Arc::new(MemoryStore::new());
    let heat = store.add_item("Heat", Some("crime")).await;
    let ronin = store.add_item("Ronin", Some("action")).await;
    let thief = store.add_item("Thief", Some("crime")).await;

    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let now = Utc::now();
    store.record_interaction(alice, heat, Some(5), now).await;
    store.record_interaction(bob, heat, Some(5), now).await;
    store.record_interaction(alice, ronin, Some(3), now).await;

    (store, Catalog { heat, ronin, thief })
}

fn ids(body: &Value) -> Vec<String> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["item_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(Arc::new(MemoryStore::new()));
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_recommendations_with_default_pipeline() {
    let (store, catalog) = seeded_store().await;
    let server = create_test_server(store);

    let response = server
        .post("/recommendations")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "k": 2,
            "exploration_factor": 0.0,
            "detailed_output": true
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        ids(&body),
        vec![catalog.heat.to_string(), catalog.ronin.to_string()]
    );
    assert_eq!(body["results"][0]["title"], "Heat");
    assert_eq!(body["results"][0]["interaction_count"], 2);
    assert!(body["results"][0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_scores_omitted_without_detailed_output() {
    let (store, _) = seeded_store().await;
    let server = create_test_server(store);

    let response = server
        .post("/recommendations")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "exploration_factor": 0.0
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.get("score").is_none()));
}

#[tokio::test]
async fn test_promotion_and_exclusion() {
    let (store, catalog) = seeded_store().await;
    let server = create_test_server(store);

    let response = server
        .post("/recommendations")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "k": 2,
            "exploration_factor": 0.0,
            "promoted_items": [catalog.thief, catalog.heat],
            "excluded_items": [catalog.heat]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        ids(&body),
        vec![catalog.thief.to_string(), catalog.ronin.to_string()]
    );
}

#[tokio::test]
async fn test_unknown_pipeline_is_not_found() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/recommendations")
        .json(&json!({
            "pipeline_id": Uuid::new_v4(),
            "user_id": Uuid::new_v4()
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_strategy_mismatch_is_bad_request() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/recommendations")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "retriever_strategy": "graph"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_arguments_are_rejected() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    for body in [
        json!({ "pipeline_id": Uuid::nil(), "user_id": Uuid::new_v4(), "k": 0 }),
        json!({ "pipeline_id": Uuid::nil(), "user_id": Uuid::new_v4(), "k": 101 }),
        json!({ "pipeline_id": Uuid::nil(), "user_id": Uuid::new_v4(), "exploration_factor": 1.5 }),
    ] {
        let response = server.post("/recommendations").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    let response = server
        .post("/trends")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "time_period": 60
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trends_rank_by_interaction_count() {
    let (store, catalog) = seeded_store().await;
    let server = create_test_server(store);

    let response = server
        .post("/trends")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "k": 5,
            "exploration_factor": 0.0,
            "time_period": 3600,
            "detailed_output": true
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        ids(&body),
        vec![catalog.heat.to_string(), catalog.ronin.to_string()]
    );
    assert_eq!(body["results"][0]["score"], 2.0);
}

#[tokio::test]
async fn test_random_recommendations_sample_catalog() {
    let (store, catalog) = seeded_store().await;
    let server = create_test_server(store);

    let response = server
        .post("/random-recommendations")
        .json(&json!({
            "pipeline_id": Uuid::nil(),
            "user_id": Uuid::new_v4(),
            "k": 10,
            "promoted_items": [catalog.ronin],
            "excluded_items": [catalog.thief]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        ids(&body),
        vec![catalog.ronin.to_string(), catalog.heat.to_string()]
    );
}

#[tokio::test]
async fn test_get_item() {
    let (store, catalog) = seeded_store().await;
    let server = create_test_server(store);

    let response = server.get(&format!("/items/{}", catalog.heat)).await;
    response.assert_status_ok();
    let item: Value = response.json();
    assert_eq!(item["title"], "Heat");
    assert_eq!(item["genre"], "crime");
    assert_eq!(item["avg_rating"], 5.0);

    let response = server.get(&format!("/items/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_and_use_pipeline() {
    let (store, _) = seeded_store().await;
    let server = create_test_server(store);

    let response = server
        .post("/pipelines")
        .json(&json!({
            "retriever_strategy": "two_tower",
            "ranker_strategy": "allocated"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let pipeline_id = created["pipeline_id"].as_str().unwrap().to_string();

    let response = server.get(&format!("/pipelines/{}", pipeline_id)).await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched, created);

    let response = server
        .post("/recommendations")
        .json(&json!({
            "pipeline_id": pipeline_id,
            "user_id": Uuid::new_v4(),
            "retriever_strategy": "two_tower",
            "ranker_strategy": "allocated"
        }))
        .await;
    response.assert_status_ok();

    // Default strategies no longer match
    let response = server
        .post("/recommendations")
        .json(&json!({ "pipeline_id": pipeline_id, "user_id": Uuid::new_v4() }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_strategy_is_rejected() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/pipelines")
        .json(&json!({ "retriever_strategy": " ", "ranker_strategy": "default" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get(&format!("/pipelines/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server(Arc::new(MemoryStore::new()));
    let request_id = Uuid::new_v4().to_string();

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_str(&request_id).unwrap(),
        )
        .await;
    assert_eq!(response.header("x-request-id"), request_id.as_str());

    let response = server.get("/health").await;
    let generated = response.header("x-request-id");
    assert!(Uuid::parse_str(generated.to_str().unwrap()).is_ok());
}
