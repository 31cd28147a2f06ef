//! Error types for the wetransfer library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for wetransfer operations.
#[derive(Error, Debug)]
pub enum WtError {
    /// Credentials were rejected by the service (401/403). Fatal, never retried.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The service answered with a 5xx status. Transient, retried with backoff.
    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// Local and remote state disagree (chunk-count mismatch, finalize while
    /// incomplete, calls out of order). Indicates a logic bug or an API
    /// contract change. Never retried.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A chunk transfer failed. Retried per chunk up to the retry limit.
    #[error("upload of part {part_number} failed: {message}")]
    Upload { part_number: u64, message: String },

    /// The given path does not resolve to a readable file.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid size passed to the chunk planner.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// The transfer has not been finalized yet, so its short URL and remote
    /// identifier are not available.
    #[error("transfer is not finalized yet")]
    NotReady,

    /// Network request error.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local I/O error while reading file content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WtError {
    /// Whether the operation that produced this error may be reissued.
    ///
    /// Transport failures, 5xx responses and chunk upload failures are
    /// transient; everything else means retrying would repeat the same
    /// mistake.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WtError::Request(_) | WtError::Service { .. } | WtError::Upload { .. }
        )
    }
}

/// Result type alias for wetransfer operations.
pub type Result<T> = std::result::Result<T, WtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(
            WtError::Service {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            WtError::Upload {
                part_number: 2,
                message: "reset".into()
            }
            .is_retryable()
        );
        assert!(!WtError::Authorization("bad key".into()).is_retryable());
        assert!(!WtError::Protocol("mismatch".into()).is_retryable());
        assert!(!WtError::NotReady.is_retryable());
        assert!(!WtError::InvalidSize("zero part size".into()).is_retryable());
    }
}
