//! GraphKB command-line interface.
//!
//! `listen` starts the server; `count`, `flush`, `read` and `query` talk to
//! the database directly with the same configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use gkb_api::{spawn_source_reload, ApiServer, ApiServerConfig, AppState, SourceRegistry};
use gkb_core::graph::wire::{GraphDecoder, GraphEncoder};
use gkb_core::{Historizer, MariaDb, NoopHistorizer, Querier, QueryOptions};
use gkb_observability::logging::{init_logging_with_config, LoggingConfig};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "graphkb")]
#[command(version)]
#[command(about = "Knowledge graph server over MariaDB", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH", default_value = "config.yml")]
    config: PathBuf,

    /// Log level: debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Listen,

    /// Print live asset and relation counts
    Count,

    /// Delete all graph data; the query history is retained
    Flush,

    /// Stream one source's subgraph and print its sizes
    Read {
        /// Source name
        source: String,
    },

    /// Execute one query and print its rows
    Query {
        /// Query text, e.g. 'MATCH (n:Server) RETURN n.value'
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_level_str(&cli.log_level)
        .map_err(anyhow::Error::msg)?;
    init_logging_with_config(logging);

    let config = Config::load(&cli.config)?;
    if config.mariadb_database.is_empty() {
        anyhow::bail!("mariadb_database must be set in the configuration or GRAPHKB_MARIADB_DATABASE");
    }
    let store = MariaDb::new(&config.mariadb()).context("cannot open the database")?;

    match cli.command {
        Commands::Listen => cmd_listen(store, config, cli.config).await,
        Commands::Count => cmd_count(store).await,
        Commands::Flush => cmd_flush(store).await,
        Commands::Read { source } => cmd_read(store, &source).await,
        Commands::Query { query } => cmd_query(store, config, &query).await,
    }
}

async fn cmd_listen(store: MariaDb, config: Config, config_path: PathBuf) -> Result<()> {
    store
        .initialize_schema()
        .await
        .context("cannot initialize the storage schema")?;

    let historizer: Arc<dyn Historizer> = if config.no_query_history {
        Arc::new(NoopHistorizer)
    } else {
        Arc::new(store.clone())
    };

    let state = AppState::new(
        store,
        historizer,
        SourceRegistry::from_config(&config.sources),
        config.concurrency,
    );
    spawn_source_reload(state.sources.clone(), move || {
        Config::load(&config_path).ok().map(|c| c.sources)
    });

    let server = ApiServer::new(
        state,
        ApiServerConfig {
            bind_address: config.listen_address()?,
        },
    );
    server.run().await.context("server failed")
}

async fn cmd_count(store: MariaDb) -> Result<()> {
    let assets = store.count_assets().await?;
    let relations = store.count_relations().await?;
    println!("{assets} assets");
    println!("{relations} relations");
    Ok(())
}

async fn cmd_flush(store: MariaDb) -> Result<()> {
    store.flush_all().await?;
    println!("{}", "flush complete".green());
    Ok(())
}

async fn cmd_read(store: MariaDb, source: &str) -> Result<()> {
    let mut buf = Vec::new();
    let mut encoder = GraphEncoder::new(&mut buf);
    store
        .read_graph(source, &mut encoder)
        .await
        .with_context(|| format!("cannot read the subgraph of {source:?}"))?;

    let graph = GraphDecoder::new(buf.as_slice()).decode()?;
    println!("assets = {}", graph.asset_count());
    println!("relations = {}", graph.relation_count());
    Ok(())
}

async fn cmd_query(store: MariaDb, config: Config, query: &str) -> Result<()> {
    let historizer: Arc<dyn Historizer> = if config.no_query_history {
        Arc::new(NoopHistorizer)
    } else {
        Arc::new(store.clone())
    };
    let querier = Querier::new(store.pool().clone(), historizer);

    let mut result = querier
        .query(
            query,
            QueryOptions {
                timeout: Duration::from_secs(30),
                ..Default::default()
            },
        )
        .await?;

    let mut count = 0usize;
    while let Some(row) = result.cursor.read().await? {
        let rendered: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("[{}]", rendered.join(", "));
        count += 1;
    }

    let total = result.statistics.parsing + result.statistics.execution;
    println!(
        "{}",
        format!(
            "{count} results found in {:.3}ms",
            total.as_secs_f64() * 1000.0
        )
        .bold()
    );
    Ok(())
}
