//! The CDN seam and its request/response types.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use sitepub_core::DistributionId;

use crate::distribution::DistributionSpec;
use crate::error::CdnError;

/// The invalidation path covering every object.
pub const ALL_PATHS: &str = "/*";

/// One cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub distribution_id: DistributionId,
    pub paths: Vec<String>,
    /// Uniqueness token; the API rejects a reused one as a duplicate.
    pub caller_reference: String,
}

impl InvalidationRequest {
    /// Invalidate `/*` with a fresh caller reference.
    pub fn all_paths(distribution_id: DistributionId) -> Self {
        Self {
            distribution_id,
            paths: vec![ALL_PATHS.to_string()],
            caller_reference: fresh_caller_reference(),
        }
    }
}

static LAST_REFERENCE: AtomicI64 = AtomicI64::new(0);

/// `sitepub-<unix nanos>`, strictly increasing within the process.
pub fn fresh_caller_reference() -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut prev = LAST_REFERENCE.load(Ordering::SeqCst);
    loop {
        let next = now.max(prev + 1);
        match LAST_REFERENCE.compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return format!("sitepub-{next}"),
            Err(actual) => prev = actual,
        }
    }
}

/// The API's acknowledgement of an invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationReceipt {
    pub id: String,
    /// Usually `InProgress`.
    pub status: String,
}

/// A distribution as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionInfo {
    pub id: DistributionId,
    pub domain_name: String,
    pub enabled: bool,
    pub status: String,
}

#[async_trait]
pub trait Cdn: Send + Sync {
    /// Submit an invalidation. Returns once it is accepted, not completed.
    async fn create_invalidation(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationReceipt, CdnError>;

    /// `None` when no distribution has this id.
    async fn get_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionInfo>, CdnError>;

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> Result<DistributionInfo, CdnError>;

    async fn set_enabled(&self, id: &DistributionId, enabled: bool) -> Result<(), CdnError>;
}
