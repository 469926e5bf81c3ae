//! Sync planning: local files × bucket listing × manifest → actions.
//!
//! [`plan`] is pure. The same plan drives `sitepub plan` (printed, nothing
//! written) and the mirror step (executed).

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use sitepub_core::Acl;

use crate::local::LocalFile;
use crate::manifest::SyncManifest;
use crate::store::RemoteObject;

/// Why a file is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadReason {
    /// Not in the bucket.
    New,
    /// Local content or remote ETag differs from the manifest record.
    Changed,
    /// In the bucket but with no manifest record to compare against.
    Untracked,
    /// Content matches but the object was uploaded with a different ACL.
    AclChanged,
}

/// One step of a sync plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Upload { file: LocalFile, reason: UploadReason },
    Delete { key: String },
    Unchanged { key: String },
}

impl SyncAction {
    pub fn key(&self) -> &str {
        match self {
            SyncAction::Upload { file, .. } => &file.key,
            SyncAction::Delete { key } | SyncAction::Unchanged { key } => key,
        }
    }
}

/// Ordered actions that make the bucket equal to the deploy directory.
///
/// Uploads and unchanged entries come first in key order, then deletes in key
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub acl: Acl,
    pub actions: Vec<SyncAction>,
}

impl SyncPlan {
    pub fn uploads(&self) -> impl Iterator<Item = (&LocalFile, UploadReason)> {
        self.actions.iter().filter_map(|a| match a {
            SyncAction::Upload { file, reason } => Some((file, *reason)),
            _ => None,
        })
    }

    pub fn deletes(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            SyncAction::Delete { key } => Some(key.as_str()),
            _ => None,
        })
    }

    pub fn unchanged_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, SyncAction::Unchanged { .. }))
            .count()
    }

    /// Number of network writes (uploads + deletes) the plan needs.
    pub fn write_count(&self) -> usize {
        self.actions.len() - self.unchanged_count()
    }

    pub fn is_noop(&self) -> bool {
        self.write_count() == 0
    }
}

/// Compute the mirror plan.
pub fn plan(
    local: &[LocalFile],
    remote: &[RemoteObject],
    manifest: Option<&SyncManifest>,
    acl: Acl,
) -> SyncPlan {
    let remote_by_key: BTreeMap<&str, &RemoteObject> =
        remote.iter().map(|o| (o.key.as_str(), o)).collect();
    let local_keys: BTreeSet<&str> = local.iter().map(|f| f.key.as_str()).collect();

    let mut sorted: Vec<&LocalFile> = local.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let mut actions = Vec::with_capacity(local.len());
    for file in sorted {
        let reason = match remote_by_key.get(file.key.as_str()) {
            None => Some(UploadReason::New),
            Some(remote) => compare(file, remote, manifest, acl),
        };
        actions.push(match reason {
            Some(reason) => SyncAction::Upload {
                file: file.clone(),
                reason,
            },
            None => SyncAction::Unchanged {
                key: file.key.clone(),
            },
        });
    }

    // BTreeMap iteration keeps deletes in key order.
    for key in remote_by_key.keys().filter(|k| !local_keys.contains(*k)) {
        actions.push(SyncAction::Delete {
            key: (*key).to_string(),
        });
    }

    SyncPlan { acl, actions }
}

fn compare(
    file: &LocalFile,
    remote: &RemoteObject,
    manifest: Option<&SyncManifest>,
    acl: Acl,
) -> Option<UploadReason> {
    let Some(manifest) = manifest else {
        return Some(UploadReason::Untracked);
    };
    let Some(record) = manifest.objects.get(&file.key) else {
        return Some(UploadReason::Untracked);
    };
    if record.sha256 != file.sha256 || record.etag != remote.etag {
        return Some(UploadReason::Changed);
    }
    if manifest.acl != Some(acl) {
        return Some(UploadReason::AclChanged);
    }
    None
}
