//! HTTP server glue for GraphKB.
//!
//! Ingestion endpoints authenticate sources by bearer token and serialize
//! commits per source; the query endpoint runs under a global concurrency
//! gate. The transports themselves stay thin: all graph semantics live in
//! `gkb-core`.

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{AuthenticatedSource, SourceRegistry};
pub use error::ApiError;
pub use server::{spawn_source_reload, ApiServer, ApiServerConfig};
pub use state::AppState;
