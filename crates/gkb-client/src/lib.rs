//! Ingestion client for GraphKB.
//!
//! Sources build their current snapshot through a [`Transaction`]
//! (`bind`/`relate`), then `commit` diffs it against the previously
//! committed snapshot and streams the minimal bulk to the server in two
//! phases of chunked, retried, parallel requests.

pub mod api;
pub mod cancel;
pub mod error;
pub mod pool;
pub mod retry;
pub mod transaction;

pub use api::{GraphApi, GraphApiConfig, GraphUploader};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use error::ClientError;
pub use pool::{drain, TaskHandle, WorkerPool};
pub use retry::{with_retry, BackoffPolicy};
pub use transaction::{Transaction, TransactionOptions};
