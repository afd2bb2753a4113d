//! Ingestion endpoints.
//!
//! All of them require source auth and serialize on the source's commit
//! lock: a busy lock answers 429, which the ingestion client absorbs with
//! its backoff policy. These endpoints are deliberately not gated by the
//! query semaphore.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use tracing::debug;

use gkb_core::SchemaGraph;

use crate::auth::AuthenticatedSource;
use crate::dto::{AssetsBody, RelationsBody};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/schema", put(update_schema))
        .route("/assets", post(insert_assets).delete(delete_assets))
        .route("/relations", post(insert_relations).delete(delete_relations))
}

async fn update_schema(
    State(state): State<AppState>,
    AuthenticatedSource(source): AuthenticatedSource,
    Json(schema): Json<SchemaGraph>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.commits.try_acquire(&source).ok_or(ApiError::Overload)?;
    debug!(source = %source, "replacing schema");
    state.store.replace_schema(&source, &schema).await?;
    Ok(StatusCode::OK)
}

async fn insert_assets(
    State(state): State<AppState>,
    AuthenticatedSource(source): AuthenticatedSource,
    Json(body): Json<AssetsBody>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.commits.try_acquire(&source).ok_or(ApiError::Overload)?;
    state.store.upsert_assets(&source, &body.assets).await?;
    Ok(StatusCode::OK)
}

async fn delete_assets(
    State(state): State<AppState>,
    AuthenticatedSource(source): AuthenticatedSource,
    Json(body): Json<AssetsBody>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.commits.try_acquire(&source).ok_or(ApiError::Overload)?;
    state.store.remove_assets(&source, &body.assets).await?;
    Ok(StatusCode::OK)
}

async fn insert_relations(
    State(state): State<AppState>,
    AuthenticatedSource(source): AuthenticatedSource,
    Json(body): Json<RelationsBody>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.commits.try_acquire(&source).ok_or(ApiError::Overload)?;
    state
        .store
        .upsert_relations(&source, &body.relations)
        .await?;
    Ok(StatusCode::OK)
}

async fn delete_relations(
    State(state): State<AppState>,
    AuthenticatedSource(source): AuthenticatedSource,
    Json(body): Json<RelationsBody>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.commits.try_acquire(&source).ok_or(ApiError::Overload)?;
    state
        .store
        .remove_relations(&source, &body.relations)
        .await?;
    Ok(StatusCode::OK)
}
