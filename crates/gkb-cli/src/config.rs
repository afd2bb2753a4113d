//! Configuration loading: a flat YAML file overridden by `GRAPHKB_`
//! environment variables.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use gkb_core::MariaDbConfig;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration, keys as documented in the README.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub mariadb_host: String,
    #[serde(default)]
    pub mariadb_username: String,
    #[serde(default)]
    pub mariadb_password: String,
    #[serde(default)]
    pub mariadb_database: String,
    #[serde(default)]
    pub mariadb_allow_cleartext_password: bool,
    #[serde(default = "default_pool_size")]
    pub mariadb_max_idle_conns: u32,
    #[serde(default = "default_pool_size")]
    pub mariadb_max_open_conns: u32,
    #[serde(default = "default_listen")]
    pub server_listen: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub no_query_history: bool,
    /// Source name to auth token.
    #[serde(default)]
    pub sources: HashMap<String, String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_concurrency() -> usize {
    32
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mariadb_host: default_host(),
            mariadb_username: String::new(),
            mariadb_password: String::new(),
            mariadb_database: String::new(),
            mariadb_allow_cleartext_password: false,
            mariadb_max_idle_conns: default_pool_size(),
            mariadb_max_open_conns: default_pool_size(),
            server_listen: default_listen(),
            concurrency: default_concurrency(),
            no_query_history: false,
            sources: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads the file, then applies `GRAPHKB_` environment overrides. A
    /// missing file falls back to defaults so a fully env-driven setup
    /// works.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => {
                info!(path = %path.display(), "using config file");
                serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using environment only");
                Config::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides scalar keys from `GRAPHKB_<KEY>` variables. The lookup is
    /// injectable so tests do not touch the process environment.
    fn apply_env_overrides<F: Fn(&str) -> Option<String>>(&mut self, get: F) {
        if let Some(v) = get("GRAPHKB_MARIADB_HOST") {
            self.mariadb_host = v;
        }
        if let Some(v) = get("GRAPHKB_MARIADB_USERNAME") {
            self.mariadb_username = v;
        }
        if let Some(v) = get("GRAPHKB_MARIADB_PASSWORD") {
            self.mariadb_password = v;
        }
        if let Some(v) = get("GRAPHKB_MARIADB_DATABASE") {
            self.mariadb_database = v;
        }
        if let Some(v) = get("GRAPHKB_MARIADB_ALLOW_CLEARTEXT_PASSWORD") {
            self.mariadb_allow_cleartext_password = parse_bool(&v);
        }
        if let Some(v) = get("GRAPHKB_MARIADB_MAX_IDLE_CONNS") {
            if let Ok(n) = v.parse() {
                self.mariadb_max_idle_conns = n;
            }
        }
        if let Some(v) = get("GRAPHKB_MARIADB_MAX_OPEN_CONNS") {
            if let Ok(n) = v.parse() {
                self.mariadb_max_open_conns = n;
            }
        }
        if let Some(v) = get("GRAPHKB_SERVER_LISTEN") {
            self.server_listen = v;
        }
        if let Some(v) = get("GRAPHKB_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.concurrency = n;
            }
        }
        if let Some(v) = get("GRAPHKB_NO_QUERY_HISTORY") {
            self.no_query_history = parse_bool(&v);
        }
    }

    /// Store settings derived from the `mariadb_*` keys.
    pub fn mariadb(&self) -> MariaDbConfig {
        MariaDbConfig {
            host: self.mariadb_host.clone(),
            username: self.mariadb_username.clone(),
            password: self.mariadb_password.clone(),
            database: self.mariadb_database.clone(),
            allow_cleartext_password: self.mariadb_allow_cleartext_password,
            max_idle_conns: self.mariadb_max_idle_conns,
            max_open_conns: self.mariadb_max_open_conns,
        }
    }

    /// The listen address; a bare `:port` binds all interfaces.
    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        let listen = if self.server_listen.starts_with(':') {
            format!("0.0.0.0{}", self.server_listen)
        } else {
            self.server_listen.clone()
        };
        listen
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid server_listen {listen:?}")))
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
