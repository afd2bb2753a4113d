//! Server assembly: router, graceful shutdown, config reload signal.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::SourceRegistry;
use crate::routes;
use crate::state::AppState;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// The GraphKB HTTP server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Binds and serves until ctrl-c or SIGTERM.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        info!(address = %self.config.bind_address, "server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

/// Reloads the source auth mapping whenever SIGHUP arrives. `load` returns
/// the fresh `source name -> token` map, or `None` when the configuration
/// cannot be read.
#[cfg(unix)]
pub fn spawn_source_reload<F>(registry: Arc<SourceRegistry>, load: F)
where
    F: Fn() -> Option<HashMap<String, String>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "cannot install SIGHUP handler, config reload disabled");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            match load() {
                Some(sources) => {
                    registry.replace(&sources).await;
                    info!(sources = sources.len(), "reloaded source auth tokens");
                }
                None => warn!("configuration reload failed, keeping previous tokens"),
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_source_reload<F>(_registry: Arc<SourceRegistry>, _load: F)
where
    F: Fn() -> Option<HashMap<String, String>> + Send + 'static,
{
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
