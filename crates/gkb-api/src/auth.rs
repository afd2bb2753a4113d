//! Source authentication: static bearer tokens mapped to source names.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::state::AppState;

/// Token-to-source mapping, loaded at startup and atomically replaced on a
/// config reload signal.
#[derive(Default)]
pub struct SourceRegistry {
    tokens: RwLock<HashMap<String, String>>,
}

impl SourceRegistry {
    /// Builds the registry from the configuration's `source name -> token`
    /// map.
    pub fn from_config(sources: &HashMap<String, String>) -> Self {
        Self {
            tokens: RwLock::new(invert(sources)),
        }
    }

    /// Resolves an auth token to its source name.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.read().await.get(token).cloned()
    }

    /// Atomically replaces the mapping.
    pub async fn replace(&self, sources: &HashMap<String, String>) {
        *self.tokens.write().await = invert(sources);
    }
}

fn invert(sources: &HashMap<String, String>) -> HashMap<String, String> {
    sources
        .iter()
        .map(|(name, token)| (token.clone(), name.clone()))
        .collect()
}

/// Extractor resolving the bearer token to a source name; rejects with 401.
pub struct AuthenticatedSource(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedSource {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))?;
        match state.sources.resolve(token).await {
            Some(source) => Ok(AuthenticatedSource(source)),
            None => Err(ApiError::Unauthorized("unknown token".to_string())),
        }
    }
}
