//! Error types for the publish pipeline.

use thiserror::Error;

use sitepub_build::BuildError;
use sitepub_cdn::CdnError;
use sitepub_core::ConfigError;
use sitepub_sync::{ProvisionError, SyncError};

/// A fatal pipeline failure. Invalidation errors never end up here.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("build failed")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("sync failed")]
    Sync(#[from] SyncError),

    #[error("distribution setup failed")]
    Distribution(#[from] CdnError),

    /// Cancelled after the build, before the bucket was touched.
    #[error("interrupted before the sync started")]
    Interrupted,

    /// A blocking task panicked.
    #[error("task failed: {0}")]
    Task(String),
}
