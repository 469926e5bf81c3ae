//! Recording CDN double.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use sitepub_core::DistributionId;

use crate::api::{Cdn, DistributionInfo, InvalidationReceipt, InvalidationRequest};
use crate::distribution::DistributionSpec;
use crate::error::CdnError;

/// Keeps distributions in memory and records every request.
#[derive(Debug, Default)]
pub struct MemoryCdn {
    distributions: Mutex<BTreeMap<String, DistributionInfo>>,
    created: Mutex<Vec<DistributionSpec>>,
    invalidations: Mutex<Vec<InvalidationRequest>>,
    fail_invalidations: AtomicBool,
    next_id: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryCdn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing distribution.
    pub fn insert(&self, info: DistributionInfo) {
        lock(&self.distributions).insert(info.id.0.clone(), info);
    }

    /// Make every invalidation fail with an API error.
    pub fn fail_invalidations(&self) {
        self.fail_invalidations.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<DistributionSpec> {
        lock(&self.created).clone()
    }

    /// Invalidation requests received, failed ones included.
    pub fn invalidations(&self) -> Vec<InvalidationRequest> {
        lock(&self.invalidations).clone()
    }

    pub fn enabled(&self, id: &DistributionId) -> Option<bool> {
        lock(&self.distributions).get(&id.0).map(|d| d.enabled)
    }
}

#[async_trait]
impl Cdn for MemoryCdn {
    async fn create_invalidation(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationReceipt, CdnError> {
        let count = {
            let mut invalidations = lock(&self.invalidations);
            invalidations.push(request.clone());
            invalidations.len()
        };
        if self.fail_invalidations.load(Ordering::SeqCst) {
            return Err(CdnError::api("CreateInvalidation", "injected throttling"));
        }
        if !lock(&self.distributions).contains_key(&request.distribution_id.0) {
            return Err(CdnError::api(
                "CreateInvalidation",
                format!("no such distribution {}", request.distribution_id),
            ));
        }
        Ok(InvalidationReceipt {
            id: format!("I{count:04}"),
            status: "InProgress".to_string(),
        })
    }

    async fn get_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionInfo>, CdnError> {
        Ok(lock(&self.distributions).get(&id.0).cloned())
    }

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> Result<DistributionInfo, CdnError> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("EMEM{n:04}");
        let info = DistributionInfo {
            id: DistributionId(id.clone()),
            domain_name: format!("d{n:04}.cloudfront.net"),
            enabled: spec.enabled,
            status: "InProgress".to_string(),
        };
        lock(&self.created).push(spec.clone());
        lock(&self.distributions).insert(id, info.clone());
        Ok(info)
    }

    async fn set_enabled(&self, id: &DistributionId, enabled: bool) -> Result<(), CdnError> {
        match lock(&self.distributions).get_mut(&id.0) {
            Some(info) => {
                info.enabled = enabled;
                Ok(())
            }
            None => Err(CdnError::NotFound { id: id.to_string() }),
        }
    }
}
