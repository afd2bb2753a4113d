//! Route assembly.

pub mod explore;
pub mod graph;
pub mod query;

use axum::Router;

use crate::state::AppState;

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/graph", graph::routes())
        .merge(query::routes())
        .merge(explore::routes())
        .with_state(state)
}
