//! Chunked apply operations with per-source provenance.
//!
//! Upserts obtain surrogate ids through `ON DUPLICATE KEY UPDATE id =
//! LAST_INSERT_ID(id)`; removals drop the provenance row first and delete
//! the entity row only when no other source still asserts it. Each chunk
//! applies inside one transaction.

use tracing::debug;

use super::MariaDb;
use crate::error::StoreError;
use crate::graph::{Asset, Relation, RelationType, SchemaGraph};

impl MariaDb {
    /// Upserts a chunk of assets for `source`.
    pub async fn upsert_assets(&self, source: &str, assets: &[Asset]) -> Result<(), StoreError> {
        if assets.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for asset in assets {
            let asset_id = upsert_asset_row(&mut tx, asset).await?;
            sqlx::query("INSERT IGNORE INTO assets_by_source (source, asset_id) VALUES (?, ?)")
                .bind(source)
                .bind(asset_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(source = %source, count = assets.len(), "upserted assets");
        Ok(())
    }

    /// Upserts a chunk of relations for `source`. Endpoints must already be
    /// stored (the transaction's phase ordering guarantees this) and every
    /// triple must be declared in the union of source schemas.
    pub async fn upsert_relations(
        &self,
        source: &str,
        relations: &[Relation],
    ) -> Result<(), StoreError> {
        if relations.is_empty() {
            return Ok(());
        }
        let union = self.union_schema(&[]).await?;
        for relation in relations {
            let triple = RelationType::new(
                relation.from.asset_type.clone(),
                relation.relation_type.clone(),
                relation.to.asset_type.clone(),
            );
            if !union.contains(&triple) {
                return Err(StoreError::SchemaViolation {
                    from_type: triple.from_type,
                    relation_type: triple.name,
                    to_type: triple.to_type,
                });
            }
        }

        let mut tx = self.pool().begin().await?;
        for relation in relations {
            let from_id = require_asset_id(&mut tx, &relation.from).await?;
            let to_id = require_asset_id(&mut tx, &relation.to).await?;
            let result = sqlx::query(
                "INSERT INTO relations (from_id, to_id, type) VALUES (?, ?, ?) \
                 ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)",
            )
            .bind(from_id)
            .bind(to_id)
            .bind(&relation.relation_type)
            .execute(&mut *tx)
            .await?;
            let relation_id = result.last_insert_id() as i64;
            sqlx::query(
                "INSERT IGNORE INTO relations_by_source (source, relation_id) VALUES (?, ?)",
            )
            .bind(source)
            .bind(relation_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(source = %source, count = relations.len(), "upserted relations");
        Ok(())
    }

    /// Retracts a chunk of assets for `source`. The asset row disappears
    /// only when its provenance becomes empty. Unknown assets are ignored so
    /// retries stay idempotent.
    pub async fn remove_assets(&self, source: &str, assets: &[Asset]) -> Result<(), StoreError> {
        if assets.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for asset in assets {
            let asset_id: Option<i64> =
                sqlx::query_scalar("SELECT id FROM assets WHERE type = ? AND value = ?")
                    .bind(&asset.asset_type)
                    .bind(&asset.value)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some(asset_id) = asset_id else {
                continue;
            };
            sqlx::query("DELETE FROM assets_by_source WHERE source = ? AND asset_id = ?")
                .bind(source)
                .bind(asset_id)
                .execute(&mut *tx)
                .await?;
            let remaining: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM assets_by_source WHERE asset_id = ?")
                    .bind(asset_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if remaining == 0 {
                sqlx::query("DELETE FROM assets WHERE id = ?")
                    .bind(asset_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        debug!(source = %source, count = assets.len(), "removed assets");
        Ok(())
    }

    /// Retracts a chunk of relations for `source`, symmetric to
    /// [`MariaDb::remove_assets`].
    pub async fn remove_relations(
        &self,
        source: &str,
        relations: &[Relation],
    ) -> Result<(), StoreError> {
        if relations.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for relation in relations {
            let relation_id = match resolve_relation_id(&mut tx, relation).await? {
                Some(id) => id,
                None => continue,
            };
            sqlx::query("DELETE FROM relations_by_source WHERE source = ? AND relation_id = ?")
                .bind(source)
                .bind(relation_id)
                .execute(&mut *tx)
                .await?;
            let remaining: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM relations_by_source WHERE relation_id = ?",
            )
            .bind(relation_id)
            .fetch_one(&mut *tx)
            .await?;
            if remaining == 0 {
                sqlx::query("DELETE FROM relations WHERE id = ?")
                    .bind(relation_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        debug!(source = %source, count = relations.len(), "removed relations");
        Ok(())
    }

    /// Atomically replaces the schema a source declares.
    pub async fn replace_schema(
        &self,
        source: &str,
        schema: &SchemaGraph,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(schema)?;
        sqlx::query(
            "INSERT INTO schema_by_source (source, schema_blob) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE schema_blob = VALUES(schema_blob)",
        )
        .bind(source)
        .bind(&blob)
        .execute(self.pool())
        .await?;
        debug!(source = %source, "replaced source schema");
        Ok(())
    }

    /// Loads the merged schema of the named sources; all sources when the
    /// filter is empty.
    pub async fn union_schema(&self, sources: &[String]) -> Result<SchemaGraph, StoreError> {
        let blobs: Vec<String> = if sources.is_empty() {
            sqlx::query_scalar("SELECT schema_blob FROM schema_by_source")
                .fetch_all(self.pool())
                .await?
        } else {
            let placeholders = vec!["?"; sources.len()].join(", ");
            let sql = format!(
                "SELECT schema_blob FROM schema_by_source WHERE source IN ({placeholders})"
            );
            let mut query = sqlx::query_scalar(&sql);
            for source in sources {
                query = query.bind(source);
            }
            query.fetch_all(self.pool()).await?
        };

        let mut union = SchemaGraph::new();
        for blob in blobs {
            let schema: SchemaGraph = serde_json::from_str(&blob)?;
            union.merge(&schema);
        }
        Ok(union)
    }
}

async fn upsert_asset_row(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    asset: &Asset,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        "INSERT INTO assets (type, value) VALUES (?, ?) \
         ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)",
    )
    .bind(&asset.asset_type)
    .bind(&asset.value)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_id() as i64)
}

async fn require_asset_id(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    asset: &Asset,
) -> Result<i64, StoreError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM assets WHERE type = ? AND value = ?")
        .bind(&asset.asset_type)
        .bind(&asset.value)
        .fetch_optional(&mut **tx)
        .await?;
    id.ok_or_else(|| StoreError::NotFound {
        entity: "asset".to_string(),
        id: format!("{}:{}", asset.asset_type, asset.value),
    })
}

async fn resolve_relation_id(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    relation: &Relation,
) -> Result<Option<i64>, StoreError> {
    let id: Option<i64> = sqlx::query_scalar(
        "SELECT r.id FROM relations r \
         JOIN assets fa ON fa.id = r.from_id \
         JOIN assets ta ON ta.id = r.to_id \
         WHERE fa.type = ? AND fa.value = ? AND r.type = ? AND ta.type = ? AND ta.value = ?",
    )
    .bind(&relation.from.asset_type)
    .bind(&relation.from.value)
    .bind(&relation.relation_type)
    .bind(&relation.to.asset_type)
    .bind(&relation.to.value)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(id)
}
