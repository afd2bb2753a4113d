//! MariaDB storage projection.
//!
//! Projects the typed property graph into normalized relational tables with
//! per-source provenance. Assets and relations stay stored only while at
//! least one source asserts them.

mod apply;
mod read;
mod schema;

pub use read::{escape_like_pattern, DatabaseSummary, SearchHits};

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::warn;

use crate::error::StoreError;
use crate::history::Historizer;

/// Connection settings for the MariaDB store.
#[derive(Debug, Clone)]
pub struct MariaDbConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub allow_cleartext_password: bool,
    /// Connections kept idle in the pool.
    pub max_idle_conns: u32,
    /// Upper bound on open connections.
    pub max_open_conns: u32,
}

impl Default for MariaDbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
            allow_cleartext_password: false,
            max_idle_conns: 10,
            max_open_conns: 10,
        }
    }
}

impl MariaDbConfig {
    /// Splits `host[:port]` into its parts, defaulting to port 3306.
    fn host_and_port(&self) -> Result<(String, u16), StoreError> {
        match self.host.split_once(':') {
            None => Ok((self.host.clone(), 3306)),
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    StoreError::Configuration(format!("invalid port in host {:?}", self.host))
                })?;
                Ok((host.to_string(), port))
            }
        }
    }
}

/// The MariaDB-backed graph store.
#[derive(Clone, Debug)]
pub struct MariaDb {
    pool: MySqlPool,
}

impl MariaDb {
    /// Builds the connection pool. Connections are established lazily on
    /// first use.
    pub fn new(config: &MariaDbConfig) -> Result<Self, StoreError> {
        if config.database.is_empty() {
            return Err(StoreError::Configuration(
                "database name must be provided".to_string(),
            ));
        }
        let (host, port) = config.host_and_port()?;
        let mut options = MySqlConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&config.username)
            .database(&config.database);
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }
        if config.allow_cleartext_password {
            options = options.enable_cleartext_plugin(true);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.max_idle_conns.min(config.max_open_conns))
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy_with(options);
        Ok(Self { pool })
    }

    /// Wraps an existing pool, for tests driving a disposable database.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Probes connectivity with a trivial round-trip.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Historizer for MariaDb {
    /// Enqueues the history row on a detached task; the query path never
    /// waits for the insert and failures are logged and swallowed.
    async fn record(&self, query: &str, parsing: Duration, execution: Duration) {
        let pool = self.pool.clone();
        let query = query.to_string();
        tokio::spawn(async move {
            let result = sqlx::query(
                "INSERT INTO query_history (query, parsing_ns, execution_ns) VALUES (?, ?, ?)",
            )
            .bind(&query)
            .bind(parsing.as_nanos() as i64)
            .bind(execution.as_nanos() as i64)
            .execute(&pool)
            .await;
            if let Err(e) = result {
                warn!(error = %e, "failed to record query history");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_and_port_defaults() {
        let config = MariaDbConfig {
            host: "db.internal".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.host_and_port().unwrap(),
            ("db.internal".to_string(), 3306)
        );
    }

    #[test]
    fn test_host_and_port_explicit() {
        let config = MariaDbConfig {
            host: "db.internal:3307".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.host_and_port().unwrap(),
            ("db.internal".to_string(), 3307)
        );
    }

    #[test]
    fn test_new_requires_database_name() {
        let err = MariaDb::new(&MariaDbConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }
}
