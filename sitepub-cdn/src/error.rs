//! Error types for sitepub-cdn.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdnError {
    /// The CDN API refused or failed a request.
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    /// A configured distribution id does not exist.
    #[error("distribution {id} not found")]
    NotFound { id: String },

    /// Reading or writing the persisted distribution id failed.
    #[error("distribution state error at {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CdnError {
    pub(crate) fn api(operation: &'static str, message: impl Into<String>) -> Self {
        CdnError::Api {
            operation,
            message: message.into(),
        }
    }
}
