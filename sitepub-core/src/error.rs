//! Error types for sitepub-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving or validating a [`DeployConfig`].
///
/// [`DeployConfig`]: crate::DeployConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file or probing a directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the config file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No bucket was named in the config file or on the command line.
    #[error("no bucket configured; set `bucket` in sitepub.yaml or pass --bucket")]
    MissingBucket,

    /// The bucket name breaks S3 naming rules.
    #[error("invalid bucket name '{name}': {reason}")]
    InvalidBucket { name: String, reason: &'static str },

    /// Index/error documents must be bare file names.
    #[error("invalid {field} '{value}': expected a bare file name")]
    InvalidDocument { field: &'static str, value: String },

    /// A numeric or enumerated setting is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// The generator source directory does not exist or is not a directory.
    #[error("source directory {path} does not exist or is not a directory")]
    SourceDirMissing { path: PathBuf },

    /// The deploy directory is missing, so there is nothing to sync.
    #[error("deploy directory {path} does not exist; build the site first")]
    DeployDirMissing { path: PathBuf },

    /// The deploy directory exists but holds no files.
    #[error("deploy directory {path} is empty; refusing to mirror an empty site")]
    DeployDirEmpty { path: PathBuf },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
