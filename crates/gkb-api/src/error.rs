//! API error type and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gkb_core::{QueryError, StoreError};

/// Errors rendered to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request, including query parse and plan failures.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or unknown auth token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown source or resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflicting write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Another commit for the same source is in flight; retry with backoff.
    #[error("overloaded, retry later")]
    Overload,

    /// The operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Storage failure.
    #[error("database error: {0}")]
    Database(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Overload => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Overload => "OVERLOAD",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ApiError::NotFound(format!("{entity} {id}")),
            StoreError::Constraint(msg) => ApiError::Conflict(msg),
            err @ StoreError::SchemaViolation { .. } => ApiError::BadRequest(err.to_string()),
            StoreError::Timeout => ApiError::Timeout("database operation".to_string()),
            err => ApiError::Database(err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Parse(msg) => ApiError::BadRequest(format!("parse error: {msg}")),
            QueryError::Plan(msg) => ApiError::BadRequest(format!("plan error: {msg}")),
            QueryError::Timeout => ApiError::Timeout("query execution".to_string()),
            QueryError::Cancelled => ApiError::Timeout("query cancelled".to_string()),
            QueryError::Storage(err) => ApiError::Database(err.to_string()),
        }
    }
}
