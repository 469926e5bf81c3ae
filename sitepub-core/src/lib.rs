//! sitepub core library: deploy configuration, domain types and errors.
//!
//! - [`types`]: newtypes and ACL selection
//! - [`config`]: [`DeployConfig`] resolution (defaults → `sitepub.yaml` → CLI)
//! - [`persist`]: atomic JSON state files
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod persist;
pub mod types;

pub use config::{ConfigFile, ConfigSummary, DeployConfig};
pub use error::ConfigError;
pub use types::{Acl, BucketName, DistributionId, DocumentName, PrivateAcl};
