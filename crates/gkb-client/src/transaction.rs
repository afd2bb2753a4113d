//! Diffing ingestion transactions.
//!
//! A transaction accumulates a source's new snapshot through `bind` and
//! `relate`, then `commit` uploads the schema, diffs against the previous
//! snapshot and applies the bulk in two phases of chunked, retried,
//! parallel requests.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use gkb_core::{diff, Asset, Graph, GraphBinder, RelationType};

use crate::api::GraphUploader;
use crate::cancel::CancelToken;
use crate::error::ClientError;
use crate::pool::{drain, TaskHandle, WorkerPool};
use crate::retry::{with_retry, BackoffPolicy};

/// Tuning knobs for a transaction.
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// Items per streaming request.
    pub chunk_size: usize,
    /// Parallel requests to the ingestion API.
    pub parallelism: usize,
    pub policy: BackoffPolicy,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            parallelism: 4,
            policy: BackoffPolicy::default(),
        }
    }
}

struct TxState {
    current: Graph,
    new: Graph,
}

/// A source's in-flight commit bundle. `bind`/`relate` are safe under
/// concurrent callers; `commit` is single-threaded per transaction.
pub struct Transaction {
    uploader: Arc<dyn GraphUploader>,
    state: Mutex<TxState>,
    options: TransactionOptions,
}

impl Transaction {
    /// Starts from an empty previous snapshot: the first commit upserts
    /// everything.
    pub fn new(uploader: Arc<dyn GraphUploader>, options: TransactionOptions) -> Self {
        Self::with_current(uploader, options, Graph::new())
    }

    /// Starts from a cached previous snapshot, typically the graph returned
    /// by the last successful commit.
    pub fn with_current(
        uploader: Arc<dyn GraphUploader>,
        options: TransactionOptions,
        current: Graph,
    ) -> Self {
        Self {
            uploader,
            state: Mutex::new(TxState {
                current,
                new: Graph::new(),
            }),
            options,
        }
    }

    /// Binds a key to an asset type in the new snapshot.
    pub fn bind(&self, value: impl Into<String>, asset_type: impl Into<String>) -> Asset {
        let mut state = self.state.lock();
        GraphBinder::new(&mut state.new).bind(value, asset_type)
    }

    /// Relates two keys through a schema triple in the new snapshot.
    pub fn relate(
        &self,
        from_value: impl Into<String>,
        relation_type: &RelationType,
        to_value: impl Into<String>,
    ) {
        let mut state = self.state.lock();
        GraphBinder::new(&mut state.new).relate(from_value, relation_type, to_value);
    }

    /// Uploads the new snapshot as a minimal diff. On success the new
    /// snapshot becomes the cached current one and is returned to the
    /// caller; on failure the transaction state is untouched so the commit
    /// can be retried.
    pub async fn commit(&self, cancel: &CancelToken) -> Result<Graph, ClientError> {
        let (current, new) = {
            let state = self.state.lock();
            (state.current.clone(), state.new.clone())
        };

        self.uploader
            .update_schema(&new.extract_schema())
            .await?;

        let bulk = diff(&current, &new);
        info!(
            asset_upserts = bulk.asset_upserts.len(),
            asset_removals = bulk.asset_removals.len(),
            relation_upserts = bulk.relation_upserts.len(),
            relation_removals = bulk.relation_removals.len(),
            "uploading graph bulk"
        );

        let pool = WorkerPool::new(self.options.parallelism);

        // Phase A: relation removals and asset upserts. Asset upserts cannot
        // break endpoint closure (nothing references them yet) and relation
        // removals cannot orphan assets (asset removals wait for phase B).
        let mut handles: Vec<TaskHandle> = Vec::new();
        for chunk in chunk_items(&bulk.relation_removals, self.options.chunk_size) {
            let chunk = Arc::new(chunk);
            handles.push(self.submit(&pool, cancel, "delete_relations", move |u| {
                let chunk = chunk.clone();
                async move { u.delete_relations(&chunk).await }
            }));
        }
        for chunk in chunk_items(&bulk.asset_upserts, self.options.chunk_size) {
            let chunk = Arc::new(chunk);
            handles.push(self.submit(&pool, cancel, "insert_assets", move |u| {
                let chunk = chunk.clone();
                async move { u.insert_assets(&chunk).await }
            }));
        }
        drain(handles, cancel).await?;

        // Phase B: asset removals are safe now that phase A retracted every
        // edge referencing them; relation upserts find their endpoints.
        let mut handles: Vec<TaskHandle> = Vec::new();
        for chunk in chunk_items(&bulk.asset_removals, self.options.chunk_size) {
            let chunk = Arc::new(chunk);
            handles.push(self.submit(&pool, cancel, "delete_assets", move |u| {
                let chunk = chunk.clone();
                async move { u.delete_assets(&chunk).await }
            }));
        }
        for chunk in chunk_items(&bulk.relation_upserts, self.options.chunk_size) {
            let chunk = Arc::new(chunk);
            handles.push(self.submit(&pool, cancel, "insert_relations", move |u| {
                let chunk = chunk.clone();
                async move { u.insert_relations(&chunk).await }
            }));
        }
        drain(handles, cancel).await?;
        pool.close();

        let mut state = self.state.lock();
        state.current = new.clone();
        state.new = Graph::new();
        Ok(new)
    }

    fn submit<F, Fut>(
        &self,
        pool: &WorkerPool,
        cancel: &CancelToken,
        operation: &'static str,
        f: F,
    ) -> TaskHandle
    where
        F: Fn(Arc<dyn GraphUploader>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        let uploader = self.uploader.clone();
        let policy = self.options.policy.clone();
        let cancel = cancel.clone();
        pool.submit(async move {
            with_retry(&policy, &cancel, operation, || f(uploader.clone())).await
        })
    }
}

fn chunk_items<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(chunk_size.max(1))
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GraphUploader;
    use async_trait::async_trait;
    use gkb_core::{Relation, SchemaGraph};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingUploader {
        calls: Mutex<Vec<String>>,
        fail_asset_inserts: AtomicBool,
        fail_schema: AtomicBool,
    }

    impl RecordingUploader {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl GraphUploader for RecordingUploader {
        async fn update_schema(&self, _schema: &SchemaGraph) -> Result<(), ClientError> {
            if self.fail_schema.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 500,
                    message: "schema rejected".to_string(),
                });
            }
            self.calls.lock().push("update_schema".to_string());
            Ok(())
        }

        async fn insert_assets(&self, assets: &[Asset]) -> Result<(), ClientError> {
            if self.fail_asset_inserts.load(Ordering::SeqCst) {
                return Err(ClientError::Overload { retry_after: None });
            }
            self.calls
                .lock()
                .push(format!("insert_assets:{}", assets.len()));
            Ok(())
        }

        async fn delete_assets(&self, assets: &[Asset]) -> Result<(), ClientError> {
            self.calls
                .lock()
                .push(format!("delete_assets:{}", assets.len()));
            Ok(())
        }

        async fn insert_relations(&self, relations: &[Relation]) -> Result<(), ClientError> {
            self.calls
                .lock()
                .push(format!("insert_relations:{}", relations.len()));
            Ok(())
        }

        async fn delete_relations(&self, relations: &[Relation]) -> Result<(), ClientError> {
            self.calls
                .lock()
                .push(format!("delete_relations:{}", relations.len()));
            Ok(())
        }
    }

    fn connects() -> RelationType {
        RelationType::new("Server", "Connects", "Server")
    }

    fn test_options() -> TransactionOptions {
        TransactionOptions {
            chunk_size: 2,
            parallelism: 2,
            policy: BackoffPolicy::immediate(10),
        }
    }

    #[tokio::test]
    async fn test_commit_uploads_schema_then_bulk() {
        let uploader = Arc::new(RecordingUploader::default());
        let tx = Transaction::new(uploader.clone(), test_options());
        tx.relate("a", &connects(), "b");

        let committed = tx.commit(&CancelToken::never()).await.unwrap();
        assert_eq!(committed.asset_count(), 2);
        assert_eq!(committed.relation_count(), 1);

        let calls = uploader.calls();
        assert_eq!(calls[0], "update_schema");
        assert!(calls.contains(&"insert_assets:2".to_string()));
        assert!(calls.contains(&"insert_relations:1".to_string()));
    }

    #[tokio::test]
    async fn test_phase_a_fully_drains_before_phase_b() {
        let uploader = Arc::new(RecordingUploader::default());
        // Seed a current snapshot so the diff produces work for all four
        // lists: remove (x, x->y), keep a, add (b, a->b).
        let mut current = Graph::new();
        current.add_asset(Asset::new("Server", "a"));
        current.add_relation(Relation::new(
            Asset::new("Server", "x"),
            "Connects",
            Asset::new("Server", "y"),
        ));
        let tx = Transaction::with_current(uploader.clone(), test_options(), current);
        tx.relate("a", &connects(), "b");

        tx.commit(&CancelToken::never()).await.unwrap();

        let calls = uploader.calls();
        let phase_a_last = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.starts_with("delete_relations") || c.starts_with("insert_assets"))
            .map(|(i, _)| i)
            .max()
            .unwrap();
        let phase_b_first = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.starts_with("delete_assets") || c.starts_with("insert_relations"))
            .map(|(i, _)| i)
            .min()
            .unwrap();
        assert!(phase_a_last < phase_b_first, "calls: {calls:?}");
    }

    #[tokio::test]
    async fn test_empty_bulk_commit_only_replaces_schema() {
        let uploader = Arc::new(RecordingUploader::default());
        let tx = Transaction::new(uploader.clone(), test_options());

        tx.commit(&CancelToken::never()).await.unwrap();
        assert_eq!(uploader.calls(), vec!["update_schema".to_string()]);
    }

    #[tokio::test]
    async fn test_schema_failure_aborts_without_uploads() {
        let uploader = Arc::new(RecordingUploader::default());
        uploader.fail_schema.store(true, Ordering::SeqCst);
        let tx = Transaction::new(uploader.clone(), test_options());
        tx.bind("a", "Server");

        let err = tx.commit(&CancelToken::never()).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
        assert!(uploader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_persistent_overload_exhausts_retries_and_keeps_state() {
        let uploader = Arc::new(RecordingUploader::default());
        uploader.fail_asset_inserts.store(true, Ordering::SeqCst);
        let tx = Transaction::new(uploader.clone(), test_options());
        tx.bind("a", "Server");

        let err = tx.commit(&CancelToken::never()).await.unwrap_err();
        assert!(matches!(err, ClientError::Aborted { retries: 10 }));

        // The snapshot is still pending; a later commit retries it.
        uploader.fail_asset_inserts.store(false, Ordering::SeqCst);
        let committed = tx.commit(&CancelToken::never()).await.unwrap();
        assert_eq!(committed.asset_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_resets_new_snapshot() {
        let uploader = Arc::new(RecordingUploader::default());
        let tx = Transaction::new(uploader.clone(), test_options());
        tx.bind("a", "Server");
        tx.commit(&CancelToken::never()).await.unwrap();

        // Second commit with an empty new snapshot retracts everything.
        tx.commit(&CancelToken::never()).await.unwrap();
        let calls = uploader.calls();
        assert!(calls.contains(&"delete_assets:1".to_string()));
    }

    #[test]
    fn test_chunk_items_sizes() {
        let items: Vec<u32> = (0..5).collect();
        let chunks = chunk_items(&items, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], vec![4]);
        assert!(chunk_items(&Vec::<u32>::new(), 2).is_empty());
    }
}
