//! AWS client wiring.

use std::sync::Arc;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};

use sitepub_cdn::CloudFrontCdn;
use sitepub_core::DeployConfig;
use sitepub_sync::backends::s3::{S3Store, FALLBACK_REGION};

use crate::pipeline::Services;

/// Shared SDK config: the configured region, else the environment's, else
/// `us-east-1`. Credentials come from the default provider chain.
pub async fn load_sdk_config(config: &DeployConfig) -> SdkConfig {
    let region = RegionProviderChain::first_try(config.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(FALLBACK_REGION);
    aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .load()
        .await
}

/// S3 and CloudFront clients for one run.
pub async fn connect(config: &DeployConfig) -> Services {
    let sdk = load_sdk_config(config).await;
    let s3 = Arc::new(S3Store::new(&sdk, &config.bucket, config.endpoint.as_deref()));
    tracing::debug!(bucket = %config.bucket, region = s3.region(), "connected to AWS");
    Services {
        store: s3.clone(),
        admin: s3,
        cdn: Arc::new(CloudFrontCdn::new(&sdk)),
    }
}
