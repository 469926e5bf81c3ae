//! # sitepub-sync
//!
//! Mirror a local deploy directory into an object-store bucket.
//!
//! - [`local::scan`] hashes the deploy directory.
//! - [`plan::plan`] compares it with the bucket listing and the last
//!   [`manifest`] to decide what to upload, delete or leave alone.
//! - [`mirror::mirror`] executes the plan on a bounded worker pool with
//!   per-object retries.
//! - [`provision::ensure_bucket`] prepares the bucket for website hosting.
//!
//! The bucket is reached through the [`store::ObjectStore`] and
//! [`store::BucketAdmin`] traits; [`backends`] holds the S3 and in-memory
//! implementations.

pub mod backends;
pub mod content_type;
pub mod error;
pub mod local;
pub mod manifest;
pub mod mirror;
pub mod plan;
pub mod provision;
pub mod retry;
pub mod store;

pub use error::{ProvisionError, StoreError, SyncError};
pub use mirror::{mirror, prepare_plan, MirrorOptions, SyncReport};
pub use plan::{plan, SyncAction, SyncPlan, UploadReason};
pub use provision::{ensure_bucket, BucketInfo};
pub use store::{BucketAdmin, ObjectStore, PutObject, RemoteObject};
