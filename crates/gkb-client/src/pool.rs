//! Bounded worker pool with one-shot completion handles.
//!
//! Tasks are spawned immediately but only `parallelism` of them run at a
//! time; each submission returns a receiver carrying the task's result.
//! Callers collect the handles and drain them at phase boundaries.

use std::sync::Arc;

use tokio::sync::{oneshot, Semaphore};

use crate::cancel::CancelToken;
use crate::error::ClientError;

/// A completion handle for one submitted task.
pub type TaskHandle = oneshot::Receiver<Result<(), ClientError>>;

/// Bounded executor for upload chunks.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(parallelism: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(parallelism.max(1))),
        }
    }

    /// Submits a task. It starts as soon as a worker slot frees up; the
    /// returned handle resolves with its result.
    pub fn submit<F>(&self, task: F) -> TaskHandle
    where
        F: std::future::Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => task.await,
                // A closed pool fails its tasks instead of running them.
                Err(_) => Err(ClientError::Cancelled),
            };
            let _ = tx.send(result);
        });
        rx
    }

    /// Closes the pool; queued tasks fail with `Cancelled`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Drains completion handles, failing fast on the first error. A fired
/// cancellation token unblocks the drain with `Cancelled`.
pub async fn drain(handles: Vec<TaskHandle>, cancel: &CancelToken) -> Result<(), ClientError> {
    for handle in handles {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = handle => match result {
                Ok(task_result) => task_result?,
                Err(_) => return Err(ClientError::Cancelled),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_submitted_tasks_complete() {
        let pool = WorkerPool::new(4);
        let done = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let done = done.clone();
                pool.submit(async move {
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        drain(handles, &CancelToken::never()).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        drain(handles, &CancelToken::never()).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_drain_surfaces_first_error() {
        let pool = WorkerPool::new(2);
        let handles = vec![
            pool.submit(async { Ok(()) }),
            pool.submit(async {
                Err(ClientError::Api {
                    status: 500,
                    message: "boom".to_string(),
                })
            }),
        ];

        let err = drain(handles, &CancelToken::never()).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_pending_drain() {
        let pool = WorkerPool::new(1);
        let (handle, token) = cancel_pair();

        let handles = vec![pool.submit(async {
            // Never completes on its own.
            std::future::pending::<()>().await;
            Ok(())
        })];

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), drain(handles, &token))
            .await
            .expect("drain must unblock on cancellation");
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }
}
