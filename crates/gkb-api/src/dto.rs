//! Request and response bodies.

use serde::{Deserialize, Serialize};

use gkb_core::{Asset, QueryValue, Relation};

/// Body of asset upsert/removal requests: `{"assets": [...]}`.
#[derive(Debug, Deserialize)]
pub struct AssetsBody {
    pub assets: Vec<Asset>,
}

/// Body of relation upsert/removal requests: `{"relations": [...]}`.
#[derive(Debug, Deserialize)]
pub struct RelationsBody {
    pub relations: Vec<Relation>,
}

/// Body of `POST /api/query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub q: String,
    /// Decorate projected assets with their provenance sources.
    #[serde(default)]
    pub include_data_source: bool,
}

/// Result set of one query.
#[derive(Debug, Serialize)]
pub struct QueryResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<QueryValue>>,
    pub statistics: StatisticsBody,
}

/// Parse and execution timings in nanoseconds.
#[derive(Debug, Serialize)]
pub struct StatisticsBody {
    pub parsing_ns: u64,
    pub execution_ns: u64,
}

/// Response of `GET /api/sources`.
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<String>,
}
