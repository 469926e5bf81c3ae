//! The publish pipeline: build, sync, invalidate.
//!
//! Steps run strictly in sequence because each depends on the previous one
//! having finished: the bucket must be populated before the distribution is
//! touched and before the cache is invalidated.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sitepub_build::{BuildOutcome, SkipReason};
use sitepub_cdn::{ensure_distribution, invalidate, Cdn, InvalidationOutcome, InvalidationSkip};
use sitepub_core::DeployConfig;
use sitepub_sync::{ensure_bucket, mirror, BucketAdmin, MirrorOptions, ObjectStore};

use crate::error::PublishError;
use crate::outputs::PublishOutputs;
use crate::state::{PublishState, Stage, StateTracker};

/// The remote services a run talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn ObjectStore>,
    pub admin: Arc<dyn BucketAdmin>,
    pub cdn: Arc<dyn Cdn>,
}

/// Run one publish.
///
/// Build and sync failures are fatal and leave the tracker in `Failed`. An
/// invalidation failure is logged and the run still finishes in `Done`.
pub async fn publish(
    config: &DeployConfig,
    services: &Services,
    cancel: &CancellationToken,
) -> Result<PublishOutputs, PublishError> {
    let mut tracker = StateTracker::new();

    tracker.advance(PublishState::Building);
    let built = match build(config).await {
        Ok(BuildOutcome::Built { .. }) => {
            tracker.advance(PublishState::Built);
            true
        }
        Ok(BuildOutcome::Skipped(reason)) => {
            tracker.advance(PublishState::Skipped {
                stage: Stage::Build,
                reason: match reason {
                    SkipReason::DryRun => "dry-run, skipping".to_string(),
                    SkipReason::Disabled => "build disabled".to_string(),
                },
            });
            false
        }
        Err(err) => return Err(tracker.fail(err)),
    };

    tracker.advance(PublishState::Syncing);
    if cancel.is_cancelled() {
        return Err(tracker.fail(PublishError::Interrupted));
    }
    let synced = async {
        config.ensure_deploy_dir_ready()?;
        let bucket = ensure_bucket(services.admin.as_ref(), config).await?;
        let report = mirror(
            Arc::clone(&services.store),
            &MirrorOptions::from_config(config),
            cancel,
        )
        .await?;
        Ok::<_, PublishError>((bucket, report))
    }
    .await;
    let (bucket, report) = match synced {
        Ok(done) => done,
        Err(err) => return Err(tracker.fail(err)),
    };
    tracker.advance(PublishState::Synced);

    tracker.advance(PublishState::Invalidating);
    let distribution =
        match ensure_distribution(services.cdn.as_ref(), config, &bucket.website_endpoint).await {
            Ok(distribution) => distribution,
            Err(err) => return Err(tracker.fail(PublishError::from(err))),
        };

    let (invalidation, warning) =
        match invalidate(services.cdn.as_ref(), Some(&distribution.id), config).await {
            Ok(outcome) => {
                if let InvalidationOutcome::Skipped { reason } = &outcome {
                    tracker.advance(PublishState::Skipped {
                        stage: Stage::Invalidate,
                        reason: skip_message(*reason).to_string(),
                    });
                }
                (Some(outcome), None)
            }
            Err(err) => {
                tracing::warn!("invalidation failed, site is deployed but may be stale: {err}");
                (None, Some(err.to_string()))
            }
        };
    tracker.advance(PublishState::Done { warning });

    let state = tracker.current().clone();
    Ok(PublishOutputs {
        website_url: bucket.website_url(),
        bucket: bucket.bucket,
        website_endpoint: bucket.website_endpoint,
        distribution_id: distribution.id.to_string(),
        cdn_url: format!("https://{}", distribution.domain_name),
        cdn_hostname: distribution.domain_name,
        cdn_enabled: distribution.enabled,
        config: config.summary(),
        built,
        sync: report,
        invalidation,
        state,
        history: tracker.into_history(),
    })
}

/// The generator blocks on a subprocess, so it runs off the async workers.
async fn build(config: &DeployConfig) -> Result<BuildOutcome, PublishError> {
    let config = config.clone();
    let outcome = tokio::task::spawn_blocking(move || sitepub_build::run(&config))
        .await
        .map_err(|e| PublishError::Task(e.to_string()))??;
    Ok(outcome)
}

fn skip_message(reason: InvalidationSkip) -> &'static str {
    match reason {
        InvalidationSkip::DryRun => "dry-run, skipping",
        InvalidationSkip::Private => "private, skipping",
        InvalidationSkip::NoDistribution => "no distribution, skipping",
    }
}
