//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};

use gkb_core::{Historizer, MariaDb};

use crate::auth::SourceRegistry;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MariaDb>,
    pub historizer: Arc<dyn Historizer>,
    pub sources: Arc<SourceRegistry>,
    /// Global gate over concurrent query executions; ingestion is not gated
    /// by it.
    pub query_gate: Arc<Semaphore>,
    /// Per-source commit serialization.
    pub commits: Arc<CommitLocks>,
}

impl AppState {
    pub fn new(
        store: MariaDb,
        historizer: Arc<dyn Historizer>,
        sources: SourceRegistry,
        concurrency: usize,
    ) -> Self {
        Self {
            store: Arc::new(store),
            historizer,
            sources: Arc::new(sources),
            query_gate: Arc::new(Semaphore::new(concurrency.max(1))),
            commits: Arc::new(CommitLocks::default()),
        }
    }
}

/// One lock per source, taken for the duration of a mutation request. A
/// busy lock means another commit is in flight and the caller should back
/// off.
#[derive(Default)]
pub struct CommitLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CommitLocks {
    /// Returns the guard, or `None` when the source already has an
    /// in-flight commit.
    pub fn try_acquire(&self, source: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(source.to_string()).or_default().clone()
        };
        lock.try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_locks_are_exclusive_per_source() {
        let locks = CommitLocks::default();
        let guard = locks.try_acquire("s1").expect("first acquire");
        assert!(locks.try_acquire("s1").is_none());
        // A different source is unaffected.
        assert!(locks.try_acquire("s2").is_some());
        drop(guard);
        assert!(locks.try_acquire("s1").is_some());
    }
}
