//! Read-side store operations: counts, streamed subgraph reads, search.

use std::collections::HashMap;
use std::io::Write;

use futures::TryStreamExt;
use serde::Serialize;
use sqlx::Row;

use super::MariaDb;
use crate::error::StoreError;
use crate::graph::wire::GraphEncoder;
use crate::graph::{Asset, Relation};
use crate::query::AssetSummary;

/// Live cardinalities of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub assets: u64,
    pub relations: u64,
    pub sources: u64,
}

/// A page of asset search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHits {
    pub assets: Vec<AssetSummary>,
    pub total_hits: u64,
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like_pattern(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

impl MariaDb {
    /// Number of live assets across all sources.
    pub async fn count_assets(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets")
            .fetch_one(self.pool())
            .await?;
        Ok(count as u64)
    }

    /// Number of live relations across all sources.
    pub async fn count_relations(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relations")
            .fetch_one(self.pool())
            .await?;
        Ok(count as u64)
    }

    /// Counts plus the number of registered sources.
    pub async fn summary(&self) -> Result<DatabaseSummary, StoreError> {
        let sources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_by_source")
            .fetch_one(self.pool())
            .await?;
        Ok(DatabaseSummary {
            assets: self.count_assets().await?,
            relations: self.count_relations().await?,
            sources: sources as u64,
        })
    }

    /// Sources that have committed a schema, sorted by name.
    pub async fn list_sources(&self) -> Result<Vec<String>, StoreError> {
        let sources =
            sqlx::query_scalar("SELECT source FROM schema_by_source ORDER BY source")
                .fetch_all(self.pool())
                .await?;
        Ok(sources)
    }

    /// Streams the subgraph owned by `source` through the encoder: header
    /// first, then assets, then relations, fetched in pages rather than
    /// buffered wholesale.
    pub async fn read_graph<W: Write>(
        &self,
        source: &str,
        encoder: &mut GraphEncoder<W>,
    ) -> Result<(), StoreError> {
        let assets: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assets_by_source WHERE source = ?",
        )
        .bind(source)
        .fetch_one(self.pool())
        .await?;
        let relations: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM relations_by_source WHERE source = ?",
        )
        .bind(source)
        .fetch_one(self.pool())
        .await?;
        encoder
            .header(assets as u64, relations as u64)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut asset_rows = sqlx::query(
            "SELECT a.type, a.value FROM assets a \
             JOIN assets_by_source abs ON abs.asset_id = a.id \
             WHERE abs.source = ? ORDER BY a.id",
        )
        .bind(source)
        .fetch(self.pool());
        while let Some(row) = asset_rows.try_next().await? {
            let asset = Asset::new(
                row.try_get::<String, _>(0)?,
                row.try_get::<String, _>(1)?,
            );
            encoder
                .asset(&asset)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
        }
        drop(asset_rows);

        let mut relation_rows = sqlx::query(
            "SELECT fa.type, fa.value, r.type, ta.type, ta.value FROM relations r \
             JOIN relations_by_source rbs ON rbs.relation_id = r.id \
             JOIN assets fa ON fa.id = r.from_id \
             JOIN assets ta ON ta.id = r.to_id \
             WHERE rbs.source = ? ORDER BY r.id",
        )
        .bind(source)
        .fetch(self.pool());
        while let Some(row) = relation_rows.try_next().await? {
            let relation = Relation::new(
                Asset::new(row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?),
                row.try_get::<String, _>(2)?,
                Asset::new(row.try_get::<String, _>(3)?, row.try_get::<String, _>(4)?),
            );
            encoder
                .relation(&relation)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
        }
        Ok(())
    }

    /// Paged LIKE search over asset values.
    pub async fn search_assets(
        &self,
        needle: &str,
        from: u64,
        size: u64,
    ) -> Result<SearchHits, StoreError> {
        let pattern = format!("%{}%", escape_like_pattern(needle));
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE value LIKE ? ESCAPE '\\\\'")
                .bind(&pattern)
                .fetch_one(self.pool())
                .await?;

        let rows = sqlx::query(
            "SELECT id, type, value FROM assets WHERE value LIKE ? ESCAPE '\\\\' \
             ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(&pattern)
        .bind(size.min(1000) as i64)
        .bind(from as i64)
        .fetch_all(self.pool())
        .await?;

        let assets = rows
            .into_iter()
            .map(|row| {
                Ok(AssetSummary {
                    id: row.try_get::<i64, _>(0)?,
                    asset_type: row.try_get::<String, _>(1)?,
                    value: row.try_get::<String, _>(2)?,
                    sources: None,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(SearchHits {
            assets,
            total_hits: total as u64,
        })
    }

    /// Provenance sources for a batch of asset ids, for result decoration.
    pub async fn asset_sources(
        &self,
        asset_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<String>>, StoreError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; asset_ids.len()].join(", ");
        let sql = format!(
            "SELECT asset_id, source FROM assets_by_source \
             WHERE asset_id IN ({placeholders}) ORDER BY asset_id, source"
        );
        let mut query = sqlx::query(&sql);
        for id in asset_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(self.pool()).await?;

        let mut by_asset: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            let asset_id: i64 = row.try_get(0)?;
            let source: String = row.try_get(1)?;
            by_asset.entry(asset_id).or_default().push(source);
        }
        Ok(by_asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_pattern_passthrough() {
        assert_eq!(escape_like_pattern("server-01"), "server-01");
        assert_eq!(escape_like_pattern(""), "");
    }

    #[test]
    fn test_escape_like_pattern_wildcards() {
        assert_eq!(escape_like_pattern("100%"), r"100\%");
        assert_eq!(escape_like_pattern("a_b"), r"a\_b");
        assert_eq!(escape_like_pattern(r"c:\path"), r"c:\\path");
    }
}
