//! Core of GraphKB: the in-memory graph model, the MariaDB storage
//! projection, and the query engine.
//!
//! Sources push full snapshots of their subgraph; the differ reduces them to
//! minimal bulks, the store projects them into relational tables with
//! per-source provenance, and the query engine answers pattern queries over
//! the union of all sources.

pub mod error;
pub mod graph;
pub mod history;
pub mod query;
pub mod store;

pub use error::{QueryError, StoreError};
pub use graph::{diff, Asset, Bulk, Graph, GraphBinder, Relation, RelationType, SchemaGraph};
pub use history::{Historizer, NoopHistorizer};
pub use query::{Cursor, Querier, QueryOptions, QueryResult, QueryValue, Statistics};
pub use store::{MariaDb, MariaDbConfig};
