//! Query endpoint.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;

use gkb_core::{Querier, QueryOptions, QueryValue};

use crate::dto::{QueryRequest, QueryResultSet, StatisticsBody};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/query", post(run_query))
}

/// Executes one query under the global concurrency gate, drains the cursor
/// and returns the full result set.
async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResultSet>, ApiError> {
    let _permit = state
        .query_gate
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Internal("query gate closed".to_string()))?;

    let querier = Querier::new(state.store.pool().clone(), state.historizer.clone());
    let mut result = querier.query(&request.q, QueryOptions::default()).await?;

    let mut rows = Vec::new();
    while let Some(row) = result.cursor.read().await? {
        rows.push(row);
    }
    debug!(rows = rows.len(), query = %request.q, "query drained");

    if request.include_data_source {
        attach_sources(&state, &mut rows).await?;
    }

    Ok(Json(QueryResultSet {
        columns: result.columns,
        rows,
        statistics: StatisticsBody {
            parsing_ns: result.statistics.parsing.as_nanos() as u64,
            execution_ns: result.statistics.execution.as_nanos() as u64,
        },
    }))
}

/// Decorates every projected asset with its provenance sources in one
/// batched lookup.
async fn attach_sources(
    state: &AppState,
    rows: &mut [Vec<QueryValue>],
) -> Result<(), ApiError> {
    let mut ids: Vec<i64> = rows
        .iter()
        .flatten()
        .filter_map(|value| match value {
            QueryValue::Asset(asset) => Some(asset.id),
            _ => None,
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let by_asset = state.store.asset_sources(&ids).await?;
    for row in rows.iter_mut() {
        for value in row.iter_mut() {
            if let QueryValue::Asset(asset) = value {
                asset.sources = Some(by_asset.get(&asset.id).cloned().unwrap_or_default());
            }
        }
    }
    Ok(())
}
