//! Client-side error types.

use thiserror::Error;

/// Errors surfaced by the ingestion client. Only `Overload` and transient
/// transport failures are retried.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// The auth token was rejected.
    #[error("authentication rejected")]
    Unauthorized,

    /// The server answered 429; back off and retry.
    #[error("server overloaded")]
    Overload {
        /// Server-provided retry hint in seconds, when present.
        retry_after: Option<u64>,
    },

    /// Connection-level failure; usually transient.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded its deadline.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The owning cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The server rejected the request with a non-retryable status.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The retry budget was exhausted by persistent retryable failures.
    #[error("aborting after {retries} retries")]
    Aborted { retries: u32 },
}

impl ClientError {
    /// True for failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Overload { .. } | ClientError::Transport(_) | ClientError::Timeout(_)
        )
    }
}
