//! Error types for sitepub-sync.

use std::path::PathBuf;

use thiserror::Error;

use sitepub_core::ConfigError;

/// Failure of a single object-store request.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Timeouts, dropped connections, 5xx and throttling responses.
    #[error("transient store error: {0}")]
    Transient(String),

    /// The store refused the request (authorization, bad input, missing bucket).
    #[error("request rejected: {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },
}

impl StoreError {
    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Transient(_) => None,
            StoreError::Rejected { status, .. } => *status,
        }
    }
}

/// Result type for object-store requests.
pub type StoreResult<T> = Result<T, StoreError>;

/// All errors that can arise from the sync step.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The deploy directory is missing or empty.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the deploy directory failed, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Loading or saving the sync manifest failed.
    #[error("sync manifest error at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing the bucket failed after retries.
    #[error("failed to list bucket: {source}")]
    List {
        #[source]
        source: StoreError,
    },

    /// An upload or delete failed after exhausting its attempts.
    #[error("transfer of '{key}' failed after {attempts} attempt(s): {source}")]
    Transfer {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A transfer task panicked or was aborted.
    #[error("transfer task failed: {0}")]
    Task(String),

    /// Interrupted: in-flight transfers finished, queued ones were not started.
    #[error("sync interrupted: {completed} transfer(s) completed, {remaining} not started")]
    Interrupted { completed: usize, remaining: usize },
}

/// Bucket preparation failures.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{operation} failed for bucket {bucket}: {source}")]
    Api {
        operation: &'static str,
        bucket: String,
        #[source]
        source: StoreError,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
