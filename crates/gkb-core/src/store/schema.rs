//! Relational schema creation and whole-store maintenance.

use tracing::info;

use super::MariaDb;
use crate::error::StoreError;

/// DDL statements, one per table or index. All are idempotent.
const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id BIGINT NOT NULL AUTO_INCREMENT,
        type VARCHAR(255) NOT NULL,
        value VARCHAR(255) NOT NULL,
        PRIMARY KEY (id),
        UNIQUE KEY uq_assets_type_value (type, value),
        KEY idx_assets_value (value)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relations (
        id BIGINT NOT NULL AUTO_INCREMENT,
        from_id BIGINT NOT NULL,
        to_id BIGINT NOT NULL,
        type VARCHAR(255) NOT NULL,
        PRIMARY KEY (id),
        UNIQUE KEY uq_relations_triple (from_id, to_id, type),
        KEY idx_relations_from (from_id),
        KEY idx_relations_to (to_id),
        KEY idx_relations_type (type)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assets_by_source (
        source VARCHAR(64) NOT NULL,
        asset_id BIGINT NOT NULL,
        PRIMARY KEY (source, asset_id),
        KEY idx_assets_by_source_asset (asset_id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relations_by_source (
        source VARCHAR(64) NOT NULL,
        relation_id BIGINT NOT NULL,
        PRIMARY KEY (source, relation_id),
        KEY idx_relations_by_source_relation (relation_id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schema_by_source (
        source VARCHAR(64) NOT NULL,
        schema_blob MEDIUMTEXT NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        PRIMARY KEY (source)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS query_history (
        id BIGINT NOT NULL AUTO_INCREMENT,
        query TEXT NOT NULL,
        parsing_ns BIGINT NOT NULL,
        execution_ns BIGINT NOT NULL,
        at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (id),
        KEY idx_query_history_at (at)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
    "#,
];

impl MariaDb {
    /// Creates tables and indices; safe to run at every startup.
    pub async fn initialize_schema(&self) -> Result<(), StoreError> {
        for ddl in CREATE_TABLES {
            sqlx::query(ddl).execute(self.pool()).await?;
        }
        info!("storage schema initialized");
        Ok(())
    }

    /// Deletes all graph data, provenance and source schemas. The query
    /// history is retained.
    pub async fn flush_all(&self) -> Result<(), StoreError> {
        for table in [
            "relations_by_source",
            "assets_by_source",
            "relations",
            "assets",
            "schema_by_source",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(self.pool())
                .await?;
        }
        info!("flushed all graph data");
        Ok(())
    }
}
