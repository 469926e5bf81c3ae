//! The invalidation gate.

use serde::Serialize;

use sitepub_core::{DeployConfig, DistributionId};

use crate::api::{Cdn, InvalidationRequest};
use crate::error::CdnError;

/// Why no invalidation was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationSkip {
    DryRun,
    Private,
    NoDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum InvalidationOutcome {
    Accepted { id: String, status: String },
    Skipped { reason: InvalidationSkip },
}

/// Send one `/*` invalidation iff the site is public and this is not a
/// dry run.
pub async fn invalidate(
    cdn: &dyn Cdn,
    distribution: Option<&DistributionId>,
    config: &DeployConfig,
) -> Result<InvalidationOutcome, CdnError> {
    let skipped = |reason| -> Result<InvalidationOutcome, CdnError> {
        Ok(InvalidationOutcome::Skipped { reason })
    };

    if config.dry_run {
        tracing::warn!("dry-run, skipping invalidation");
        return skipped(InvalidationSkip::DryRun);
    }
    if !config.public_read {
        tracing::info!("private, skipping invalidation");
        return skipped(InvalidationSkip::Private);
    }
    let Some(id) = distribution else {
        tracing::warn!("no distribution, skipping invalidation");
        return skipped(InvalidationSkip::NoDistribution);
    };

    let request = InvalidationRequest::all_paths(id.clone());
    tracing::info!(
        distribution = %id,
        caller_reference = %request.caller_reference,
        "creating invalidation for /*"
    );
    let receipt = cdn.create_invalidation(&request).await?;
    tracing::info!(id = %receipt.id, status = %receipt.status, "invalidation accepted");
    Ok(InvalidationOutcome::Accepted {
        id: receipt.id,
        status: receipt.status,
    })
}
