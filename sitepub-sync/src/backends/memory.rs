//! In-memory bucket for tests and offline plans.
//!
//! ETags are the SHA-256 of the body, so they change exactly when content
//! changes. Failures and latency can be injected per key.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use sitepub_core::{Acl, DocumentName};

use crate::error::{StoreError, StoreResult};
use crate::local::sha256_hex;
use crate::store::{BucketAdmin, ObjectStore, PutObject, RemoteObject};

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub acl: Acl,
    pub etag: String,
}

/// Bucket-level settings applied through [`BucketAdmin`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketState {
    pub exists: bool,
    /// `(index, error)` documents.
    pub website: Option<(String, String)>,
    pub object_writer: bool,
    pub access_block_open: bool,
    pub policy: Option<String>,
}

#[derive(Debug, Clone)]
enum Fault {
    /// Fail this many times with a transient error, then succeed.
    Transient(u32),
    /// Always reject with this status.
    Rejected(u16),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    state: Mutex<BucketState>,
    faults: Mutex<HashMap<String, Fault>>,
    put_attempts: Mutex<HashMap<String, u32>>,
    put_delay: Mutex<Option<Duration>>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
    calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Seed an object as if someone else had uploaded it.
    pub fn insert(&self, key: &str, body: &str) {
        let body = Bytes::from(body.to_string());
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                etag: sha256_hex(&body),
                body,
                content_type: "application/octet-stream".to_string(),
                acl: Acl::Private,
            },
        );
    }

    /// Fail the next `times` puts of `key` with a transient error.
    pub fn fail_transient(&self, key: &str, times: u32) {
        lock(&self.faults).insert(key.to_string(), Fault::Transient(times));
    }

    /// Reject every put of `key` with `status`.
    pub fn reject(&self, key: &str, status: u16) {
        lock(&self.faults).insert(key.to_string(), Fault::Rejected(status));
    }

    /// Sleep this long inside every put.
    pub fn set_put_delay(&self, delay: Duration) {
        *lock(&self.put_delay) = Some(delay);
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        lock(&self.objects).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn bucket_state(&self) -> BucketState {
        lock(&self.state).clone()
    }

    /// Successful puts.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Successful deletes.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Every request of any kind, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Put attempts for `key`, failed ones included.
    pub fn put_attempts(&self, key: &str) -> u32 {
        lock(&self.put_attempts).get(key).copied().unwrap_or(0)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn injected_fault(&self, key: &str) -> Option<StoreError> {
        let mut faults = lock(&self.faults);
        match faults.get_mut(key) {
            Some(Fault::Transient(0)) | None => None,
            Some(Fault::Transient(remaining)) => {
                *remaining -= 1;
                Some(StoreError::Transient(format!("injected timeout for {key}")))
            }
            Some(Fault::Rejected(status)) => Some(StoreError::Rejected {
                status: Some(*status),
                message: format!("injected rejection for {key}"),
            }),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<RemoteObject>> {
        self.touch();
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.objects)
            .iter()
            .map(|(key, o)| RemoteObject {
                key: key.clone(),
                etag: o.etag.clone(),
                size: o.body.len() as u64,
            })
            .collect())
    }

    async fn put(&self, object: &PutObject) -> StoreResult<String> {
        self.touch();
        *lock(&self.put_attempts).entry(object.key.clone()).or_default() += 1;

        let delay = *lock(&self.put_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.injected_fault(&object.key) {
            return Err(err);
        }

        let etag = sha256_hex(&object.body);
        lock(&self.objects).insert(
            object.key.clone(),
            StoredObject {
                body: object.body.clone(),
                content_type: object.content_type.to_string(),
                acl: object.acl,
                etag: etag.clone(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(etag)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.touch();
        lock(&self.objects).remove(key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BucketAdmin for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn website_endpoint(&self) -> String {
        format!("{}.s3-website.memory.local", self.bucket)
    }

    async fn bucket_exists(&self) -> StoreResult<bool> {
        self.touch();
        Ok(lock(&self.state).exists)
    }

    async fn create_bucket(&self) -> StoreResult<()> {
        self.touch();
        lock(&self.state).exists = true;
        Ok(())
    }

    async fn put_website(&self, index: &DocumentName, error: &DocumentName) -> StoreResult<()> {
        self.touch();
        lock(&self.state).website = Some((index.to_string(), error.to_string()));
        Ok(())
    }

    async fn put_ownership_object_writer(&self) -> StoreResult<()> {
        self.touch();
        lock(&self.state).object_writer = true;
        Ok(())
    }

    async fn open_public_access_block(&self) -> StoreResult<()> {
        self.touch();
        lock(&self.state).access_block_open = true;
        Ok(())
    }

    async fn put_policy(&self, policy: &str) -> StoreResult<()> {
        self.touch();
        lock(&self.state).policy = Some(policy.to_string());
        Ok(())
    }

    async fn delete_policy(&self) -> StoreResult<()> {
        self.touch();
        lock(&self.state).policy = None;
        Ok(())
    }
}
