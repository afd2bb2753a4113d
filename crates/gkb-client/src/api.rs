//! Typed HTTP client for the ingestion API.
//!
//! Maps HTTP status codes onto [`ClientError`]: 429 is retryable overload,
//! 401 fails fast, anything else non-2xx carries the response body back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;

use gkb_core::{Asset, Relation, SchemaGraph};

use crate::error::ClientError;

/// Upload surface used by transactions; the HTTP client implements it, and
/// tests substitute recording fakes.
#[async_trait]
pub trait GraphUploader: Send + Sync {
    async fn update_schema(&self, schema: &SchemaGraph) -> Result<(), ClientError>;
    async fn insert_assets(&self, assets: &[Asset]) -> Result<(), ClientError>;
    async fn delete_assets(&self, assets: &[Asset]) -> Result<(), ClientError>;
    async fn insert_relations(&self, relations: &[Relation]) -> Result<(), ClientError>;
    async fn delete_relations(&self, relations: &[Relation]) -> Result<(), ClientError>;
}

/// Connection settings for [`GraphApi`].
#[derive(Debug, Clone)]
pub struct GraphApiConfig {
    /// Server base URL, e.g. `http://graphkb.internal:8080`.
    pub base_url: String,
    /// Source auth token, sent as a bearer header.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GraphApiConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP implementation of the ingestion API.
#[derive(Debug)]
pub struct GraphApi {
    client: Client,
    config: GraphApiConfig,
}

#[derive(Serialize)]
struct AssetsPayload<'a> {
    assets: &'a [Asset],
}

#[derive(Serialize)]
struct RelationsPayload<'a> {
    relations: &'a [Relation],
}

impl GraphApi {
    pub fn new(config: GraphApiConfig) -> Result<Self, ClientError> {
        if config.base_url.is_empty() {
            return Err(ClientError::Config("base_url must be set".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(e.to_string())
                } else {
                    ClientError::Transport(e.to_string())
                }
            })?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            Err(ClientError::Overload { retry_after })
        }
        _ => {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl GraphUploader for GraphApi {
    async fn update_schema(&self, schema: &SchemaGraph) -> Result<(), ClientError> {
        self.send(Method::PUT, "/api/graph/schema", schema).await
    }

    async fn insert_assets(&self, assets: &[Asset]) -> Result<(), ClientError> {
        self.send(Method::POST, "/api/graph/assets", &AssetsPayload { assets })
            .await
    }

    async fn delete_assets(&self, assets: &[Asset]) -> Result<(), ClientError> {
        self.send(
            Method::DELETE,
            "/api/graph/assets",
            &AssetsPayload { assets },
        )
        .await
    }

    async fn insert_relations(&self, relations: &[Relation]) -> Result<(), ClientError> {
        self.send(
            Method::POST,
            "/api/graph/relations",
            &RelationsPayload { relations },
        )
        .await
    }

    async fn delete_relations(&self, relations: &[Relation]) -> Result<(), ClientError> {
        self.send(
            Method::DELETE,
            "/api/graph/relations",
            &RelationsPayload { relations },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_cleanly() {
        let api = GraphApi::new(GraphApiConfig::new("http://host:8080/", "token")).unwrap();
        assert_eq!(
            api.url("/api/graph/assets"),
            "http://host:8080/api/graph/assets"
        );
        assert_eq!(
            api.url("api/graph/assets"),
            "http://host:8080/api/graph/assets"
        );
    }

    #[test]
    fn test_new_rejects_empty_base_url() {
        let err = GraphApi::new(GraphApiConfig::new("", "token")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
