//! Mirror execution.
//!
//! Transfers run on a [`JoinSet`] bounded by a [`Semaphore`]. The loop stops
//! handing out work on the first exhausted transfer or on cancellation, and
//! always waits for in-flight transfers before returning. The manifest is
//! updated as transfers complete and saved on every exit path, so a partial
//! run is not repeated in full.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use sitepub_core::{Acl, DeployConfig};

use crate::error::{io_err, SyncError};
use crate::local::{self, LocalFile};
use crate::manifest::{self, ObjectRecord, SyncManifest};
use crate::plan::{self, SyncAction, SyncPlan};
use crate::retry::{retry, RetryPolicy};
use crate::store::{ObjectStore, PutObject};

/// Inputs of one mirror run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Deploy directory.
    pub root: PathBuf,
    pub acl: Acl,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub state_dir: PathBuf,
    pub bucket: String,
}

impl MirrorOptions {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            root: config.build_dir.clone(),
            acl: config.acl(),
            concurrency: config.concurrency.max(1),
            retry: RetryPolicy::new(config.max_attempts),
            state_dir: config.state_dir.clone(),
            bucket: config.bucket.to_string(),
        }
    }
}

/// What a completed mirror run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub acl: Acl,
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: usize,
}

/// Scan, list and plan without writing anything.
pub async fn prepare_plan(
    store: &dyn ObjectStore,
    options: &MirrorOptions,
) -> Result<SyncPlan, SyncError> {
    let (plan, _, _) = prepare(store, options).await?;
    Ok(plan)
}

async fn prepare(
    store: &dyn ObjectStore,
    options: &MirrorOptions,
) -> Result<(SyncPlan, Vec<LocalFile>, Option<SyncManifest>), SyncError> {
    let root = options.root.clone();
    let files = tokio::task::spawn_blocking(move || local::scan(&root))
        .await
        .map_err(|e| SyncError::Task(e.to_string()))??;

    let remote = retry(options.retry, "list bucket", || store.list())
        .await
        .map_err(|e| SyncError::List { source: e.error })?;

    let previous = manifest::load_at(&options.state_dir, &options.bucket)?;
    let plan = plan::plan(&files, &remote, previous.as_ref(), options.acl);
    tracing::info!(
        bucket = %options.bucket,
        local = files.len(),
        remote = remote.len(),
        writes = plan.write_count(),
        "sync plan ready"
    );
    Ok((plan, files, previous))
}

/// Make the bucket mirror the deploy directory.
pub async fn mirror(
    store: Arc<dyn ObjectStore>,
    options: &MirrorOptions,
    cancel: &CancellationToken,
) -> Result<SyncReport, SyncError> {
    let (plan, files, previous) = prepare(store.as_ref(), options).await?;
    let fresh = previous.is_none();
    let noop = plan.is_noop();
    let unchanged = plan.unchanged_count();

    let transfers: Vec<Transfer> = plan
        .actions
        .into_iter()
        .filter_map(|action| match action {
            SyncAction::Upload { file, reason } => {
                tracing::debug!(key = %file.key, ?reason, "queued upload");
                Some(Transfer::Upload(file))
            }
            SyncAction::Delete { key } => Some(Transfer::Delete(key)),
            SyncAction::Unchanged { .. } => None,
        })
        .collect();
    let total = transfers.len();

    let mut progress = Progress::new(previous.unwrap_or_else(SyncManifest::empty));
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    // Set by a failing task before it releases its permit, so the loop sees
    // it even when the JoinSet has not reported the task yet.
    let aborted = Arc::new(AtomicBool::new(false));
    let mut tasks: JoinSet<Result<Done, SyncError>> = JoinSet::new();
    let mut started = 0usize;
    let mut interrupted = false;

    for transfer in transfers {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => {
                permit.map_err(|e| SyncError::Task(e.to_string()))?
            }
        };
        while let Some(joined) = tasks.try_join_next() {
            progress.record(joined);
        }
        if progress.failure.is_some() || aborted.load(Ordering::SeqCst) {
            break;
        }

        started += 1;
        let store = Arc::clone(&store);
        let aborted = Arc::clone(&aborted);
        let acl = options.acl;
        let policy = options.retry;
        tasks.spawn(async move {
            let result = transfer.run(store.as_ref(), acl, policy).await;
            if result.is_err() {
                aborted.store(true, Ordering::SeqCst);
            }
            drop(permit);
            result
        });
    }

    while let Some(joined) = tasks.join_next().await {
        progress.record(joined);
    }

    let Progress {
        mut manifest,
        uploaded,
        deleted,
        failure,
    } = progress;
    let complete = failure.is_none() && !interrupted;

    if complete {
        let local_keys: BTreeSet<&str> = files.iter().map(|f| f.key.as_str()).collect();
        manifest.objects.retain(|key, _| local_keys.contains(key.as_str()));
        manifest.acl = Some(options.acl);
    } else if fresh {
        manifest.acl = Some(options.acl);
    } else if manifest.acl != Some(options.acl) {
        // Records now mix ACLs; force a full re-upload next time.
        manifest.acl = None;
    }

    if !(complete && noop && !fresh) {
        manifest.synced_at = Utc::now();
        manifest::save_at(&options.state_dir, &options.bucket, &manifest)?;
    }

    if let Some(err) = failure {
        return Err(err);
    }
    if interrupted {
        let completed = uploaded.len() + deleted.len();
        tracing::warn!(completed, remaining = total - started, "sync interrupted");
        return Err(SyncError::Interrupted {
            completed,
            remaining: total - started,
        });
    }

    tracing::info!(
        bucket = %options.bucket,
        uploaded = uploaded.len(),
        deleted = deleted.len(),
        unchanged,
        "sync complete"
    );
    Ok(SyncReport {
        acl: options.acl,
        uploaded,
        deleted,
        unchanged,
    })
}

enum Transfer {
    Upload(LocalFile),
    Delete(String),
}

enum Done {
    Uploaded { key: String, record: ObjectRecord },
    Deleted { key: String },
}

impl Transfer {
    async fn run(
        self,
        store: &dyn ObjectStore,
        acl: Acl,
        policy: RetryPolicy,
    ) -> Result<Done, SyncError> {
        match self {
            Transfer::Upload(file) => {
                let body = tokio::fs::read(&file.path)
                    .await
                    .map_err(|e| io_err(&file.path, e))?;
                let object = PutObject {
                    key: file.key.clone(),
                    body: Bytes::from(body),
                    content_type: file.content_type,
                    acl,
                };
                let label = format!("upload {}", file.key);
                let etag = retry(policy, &label, || store.put(&object))
                    .await
                    .map_err(|e| SyncError::Transfer {
                        key: file.key.clone(),
                        attempts: e.attempts,
                        source: e.error,
                    })?;
                tracing::info!(key = %file.key, %acl, "uploaded");
                Ok(Done::Uploaded {
                    key: file.key,
                    record: ObjectRecord {
                        sha256: file.sha256,
                        etag,
                    },
                })
            }
            Transfer::Delete(key) => {
                let label = format!("delete {key}");
                retry(policy, &label, || store.delete(&key))
                    .await
                    .map_err(|e| SyncError::Transfer {
                        key: key.clone(),
                        attempts: e.attempts,
                        source: e.error,
                    })?;
                tracing::info!(key = %key, "deleted");
                Ok(Done::Deleted { key })
            }
        }
    }
}

struct Progress {
    manifest: SyncManifest,
    uploaded: Vec<String>,
    deleted: Vec<String>,
    failure: Option<SyncError>,
}

impl Progress {
    fn new(manifest: SyncManifest) -> Self {
        Self {
            manifest,
            uploaded: Vec::new(),
            deleted: Vec::new(),
            failure: None,
        }
    }

    fn record(&mut self, joined: Result<Result<Done, SyncError>, JoinError>) {
        let result = joined.unwrap_or_else(|e| Err(SyncError::Task(e.to_string())));
        match result {
            Ok(Done::Uploaded { key, record }) => {
                self.manifest.objects.insert(key.clone(), record);
                self.uploaded.push(key);
            }
            Ok(Done::Deleted { key }) => {
                self.manifest.objects.remove(&key);
                self.deleted.push(key);
            }
            Err(err) if self.failure.is_none() => {
                tracing::error!("{err}");
                self.failure = Some(err);
            }
            Err(err) => tracing::error!("{err}"),
        }
    }
}
