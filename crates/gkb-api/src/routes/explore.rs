//! Read-only exploration endpoints: sources, database summary, union
//! schema, asset search, health.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use gkb_core::store::{DatabaseSummary, SearchHits};
use gkb_core::SchemaGraph;

use crate::dto::SourcesResponse;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sources", get(list_sources))
        .route("/api/database", get(database_summary))
        .route("/api/schema", get(union_schema))
        .route("/search/assets", get(search_assets))
        .route("/health", get(health))
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = state.store.list_sources().await?;
    Ok(Json(SourcesResponse { sources }))
}

async fn database_summary(
    State(state): State<AppState>,
) -> Result<Json<DatabaseSummary>, ApiError> {
    Ok(Json(state.store.summary().await?))
}

#[derive(Debug, Deserialize)]
struct SchemaParams {
    /// Comma-separated source names; empty means all sources.
    #[serde(default)]
    sources: String,
}

async fn union_schema(
    State(state): State<AppState>,
    Query(params): Query<SchemaParams>,
) -> Result<Json<SchemaGraph>, ApiError> {
    let sources: Vec<String> = params
        .sources
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Json(state.store.union_schema(&sources).await?))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    from: u64,
    #[serde(default = "default_search_size")]
    size: u64,
}

fn default_search_size() -> u64 {
    20
}

async fn search_assets(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchHits>, ApiError> {
    let hits = state
        .store
        .search_assets(&params.q, params.from, params.size)
        .await?;
    Ok(Json(hits))
}

async fn health(State(state): State<AppState>) -> StatusCode {
    if state.store.is_healthy().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
