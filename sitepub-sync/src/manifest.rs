//! Sync manifest: SHA-256 and ETag tracking for uploaded objects.
//!
//! Persists a [`SyncManifest`] JSON document at
//! `<state_dir>/<bucket>.manifest.json`. Writes use the atomic `.tmp` + rename helper
//! from `sitepub_core::persist`.
//!
//! The manifest alone never decides that an object is unchanged: the remote
//! ETag recorded at upload time must still match the bucket listing, so an
//! object rewritten by someone else is uploaded again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitepub_core::{persist, Acl};

use crate::error::SyncError;

/// What was uploaded for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub sha256: String,
    pub etag: String,
}

/// On-disk manifest payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncManifest {
    pub synced_at: DateTime<Utc>,
    /// ACL every recorded object was uploaded with. `None` after a partial
    /// run that changed the ACL.
    pub acl: Option<Acl>,
    pub objects: BTreeMap<String, ObjectRecord>,
}

impl SyncManifest {
    pub fn empty() -> Self {
        Self {
            synced_at: Utc::now(),
            acl: None,
            objects: BTreeMap::new(),
        }
    }
}

/// `<state_dir>/<bucket>.manifest.json`
pub fn manifest_path_at(state_dir: &Path, bucket: &str) -> PathBuf {
    state_dir.join(format!("{bucket}.manifest.json"))
}

/// Load the manifest for `bucket`, or `None` if it was never written.
pub fn load_at(state_dir: &Path, bucket: &str) -> Result<Option<SyncManifest>, SyncError> {
    let path = manifest_path_at(state_dir, bucket);
    persist::load_json(&path).map_err(|source| SyncError::Manifest { path, source })
}

/// Save the manifest for `bucket` atomically.
pub fn save_at(state_dir: &Path, bucket: &str, manifest: &SyncManifest) -> Result<(), SyncError> {
    let path = manifest_path_at(state_dir, bucket);
    persist::save_json(&path, manifest).map_err(|source| SyncError::Manifest { path, source })
}
