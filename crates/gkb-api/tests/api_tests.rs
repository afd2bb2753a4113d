//! Router-level tests that exercise auth, error mapping and commit
//! serialization without a database: every asserted path rejects before the
//! store is touched (the pool connects lazily).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use gkb_api::{ApiServer, ApiServerConfig, AppState, SourceRegistry};
use gkb_core::{MariaDb, MariaDbConfig, NoopHistorizer};

fn test_state() -> AppState {
    let store = MariaDb::new(&MariaDbConfig {
        host: "127.0.0.1".to_string(),
        database: "graphkb_test".to_string(),
        ..Default::default()
    })
    .expect("lazy store");
    let sources = SourceRegistry::from_config(&HashMap::from([(
        "s1".to_string(),
        "token-1".to_string(),
    )]));
    AppState::new(store, Arc::new(NoopHistorizer), sources, 32)
}

fn test_router(state: &AppState) -> axum::Router {
    ApiServer::new(state.clone(), ApiServerConfig::default()).router()
}

fn schema_request(auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri("/api/graph/schema")
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder
        .body(Body::from(r#"{"asset_types":[],"relation_types":[]}"#))
        .unwrap()
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let state = test_state();
    let response = test_router(&state)
        .oneshot(schema_request(None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let state = test_state();
    let response = test_router(&state)
        .oneshot(schema_request(Some("Bearer wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_auth_is_unauthorized() {
    let state = test_state();
    let response = test_router(&state)
        .oneshot(schema_request(Some("Basic dXNlcjpwdw==")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_busy_commit_lock_answers_overload() {
    let state = test_state();
    let _guard = state.commits.try_acquire("s1").expect("lock");

    let response = test_router(&state)
        .oneshot(schema_request(Some("Bearer token-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_query_parse_error_is_bad_request() {
    let state = test_state();
    let request = Request::builder()
        .method("POST")
        .uri("/api/query")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"q": "MATCH (n RETURN n"}"#))
        .unwrap();

    let response = test_router(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["code"], "BAD_REQUEST");
    assert!(parsed["message"].as_str().unwrap().contains("parse error"));
}

#[tokio::test]
async fn test_query_plan_error_is_bad_request() {
    let state = test_state();
    let request = Request::builder()
        .method("POST")
        .uri("/api/query")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"q": "MATCH (n {name: \"x\"}) RETURN n"}"#))
        .unwrap();

    let response = test_router(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingestion_is_not_gated_by_query_semaphore() {
    let state = test_state();
    // Exhaust the query gate entirely.
    let permits: Vec<_> = (0..32)
        .map(|_| state.query_gate.clone().try_acquire_owned().unwrap())
        .collect();

    // Ingestion still answers (it would reach the store; with the commit
    // lock held we observe 429, proving the request was not queued behind
    // the semaphore).
    let _guard = state.commits.try_acquire("s1").expect("lock");
    let response = test_router(&state)
        .oneshot(schema_request(Some("Bearer token-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    drop(permits);
}
