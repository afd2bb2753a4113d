//! Query history sinks.
//!
//! Recording must never block or fail the query path: implementations
//! enqueue their work and swallow failures.

use std::time::Duration;

use async_trait::async_trait;

/// Sink for per-query parse/execution timings.
#[async_trait]
pub trait Historizer: Send + Sync {
    /// Records one executed query. Completes as soon as the record is
    /// enqueued; persistence failures are logged, never surfaced.
    async fn record(&self, query: &str, parsing: Duration, execution: Duration);
}

/// Historizer that drops every record, selected by `no_query_history`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHistorizer;

#[async_trait]
impl Historizer for NoopHistorizer {
    async fn record(&self, _query: &str, _parsing: Duration, _execution: Duration) {}
}
