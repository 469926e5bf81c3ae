//! Object-store seams.
//!
//! [`ObjectStore`] carries the object traffic of a mirror run and
//! [`BucketAdmin`] the one-off bucket configuration calls. Both are
//! implemented by [`crate::backends::s3::S3Store`] and
//! [`crate::backends::memory::MemoryStore`].

use async_trait::async_trait;
use bytes::Bytes;

use sitepub_core::{Acl, DocumentName};

use crate::error::StoreResult;

/// One object as reported by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// ETag without surrounding quotes.
    pub etag: String,
    pub size: u64,
}

/// An upload request.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Bytes,
    pub content_type: &'static str,
    pub acl: Acl,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object in the bucket, across all pages.
    async fn list(&self) -> StoreResult<Vec<RemoteObject>>;

    /// Upload one object and return its new ETag.
    async fn put(&self, object: &PutObject) -> StoreResult<String>;

    /// Delete one object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait BucketAdmin: Send + Sync {
    fn bucket(&self) -> &str;

    /// Host name of the bucket's static website endpoint.
    fn website_endpoint(&self) -> String;

    async fn bucket_exists(&self) -> StoreResult<bool>;

    /// Create the bucket. A bucket already owned by the caller is not an error.
    async fn create_bucket(&self) -> StoreResult<()>;

    async fn put_website(&self, index: &DocumentName, error: &DocumentName) -> StoreResult<()>;

    /// Object ownership `ObjectWriter`, so per-object ACLs take effect.
    async fn put_ownership_object_writer(&self) -> StoreResult<()>;

    /// Public-access block with every flag cleared.
    async fn open_public_access_block(&self) -> StoreResult<()>;

    async fn put_policy(&self, policy: &str) -> StoreResult<()>;

    /// Remove the bucket policy. Succeeds when there is none.
    async fn delete_policy(&self) -> StoreResult<()>;
}
