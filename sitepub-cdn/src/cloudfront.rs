//! CloudFront implementation of [`Cdn`].

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudfront::error::{BuildError, DisplayErrorContext, SdkError};
use aws_sdk_cloudfront::types::{
    AllowedMethods, CachedMethods, CookiePreference, CustomErrorResponse, CustomErrorResponses,
    CustomOriginConfig, DefaultCacheBehavior, DistributionConfig, ForwardedValues,
    GeoRestriction, GeoRestrictionType, InvalidationBatch, ItemSelection, Method, Origin,
    OriginProtocolPolicy, OriginSslProtocols, Origins, Paths, PriceClass, Restrictions,
    SslProtocol, ViewerCertificate, ViewerProtocolPolicy,
};
use aws_sdk_cloudfront::Client;
use tracing::instrument;

use sitepub_core::DistributionId;

use crate::api::{Cdn, DistributionInfo, InvalidationReceipt, InvalidationRequest};
use crate::distribution::{
    DistributionSpec, CACHED_METHODS, ORIGIN_HTTPS_PORT, ORIGIN_HTTP_PORT, ORIGIN_TLS_PROTOCOL,
};
use crate::error::CdnError;

#[derive(Debug, Clone)]
pub struct CloudFrontCdn {
    client: Client,
}

impl CloudFrontCdn {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }
}

fn api_err<E>(operation: &'static str) -> impl FnOnce(SdkError<E>) -> CdnError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| CdnError::api(operation, DisplayErrorContext(&err).to_string())
}

fn build_err(operation: &'static str) -> impl FnOnce(BuildError) -> CdnError {
    move |err| CdnError::api(operation, err.to_string())
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(service) if service.raw().status().as_u16() == 404)
}

fn methods() -> Vec<Method> {
    CACHED_METHODS.iter().map(|m| Method::from(*m)).collect()
}

// Cache TTLs and forwarded values are the legacy cache settings.
#[allow(deprecated)]
fn distribution_config(spec: &DistributionSpec) -> Result<DistributionConfig, BuildError> {
    let origin = Origin::builder()
        .id(&spec.origin_id)
        .domain_name(&spec.origin_domain)
        .custom_origin_config(
            CustomOriginConfig::builder()
                .http_port(ORIGIN_HTTP_PORT)
                .https_port(ORIGIN_HTTPS_PORT)
                .origin_protocol_policy(OriginProtocolPolicy::from("http-only"))
                .origin_ssl_protocols(
                    OriginSslProtocols::builder()
                        .quantity(1)
                        .items(SslProtocol::from(ORIGIN_TLS_PROTOCOL))
                        .build()?,
                )
                .build()?,
        )
        .build()?;

    let quantity = CACHED_METHODS.len() as i32;
    let behavior = DefaultCacheBehavior::builder()
        .target_origin_id(&spec.origin_id)
        .viewer_protocol_policy(ViewerProtocolPolicy::from("redirect-to-https"))
        .allowed_methods(
            AllowedMethods::builder()
                .quantity(quantity)
                .set_items(Some(methods()))
                .cached_methods(
                    CachedMethods::builder()
                        .quantity(quantity)
                        .set_items(Some(methods()))
                        .build()?,
                )
                .build()?,
        )
        .forwarded_values(
            ForwardedValues::builder()
                .query_string(true)
                .cookies(
                    CookiePreference::builder()
                        .forward(ItemSelection::from("all"))
                        .build()?,
                )
                .build()?,
        )
        .min_ttl(spec.ttl_secs)
        .default_ttl(spec.ttl_secs)
        .max_ttl(spec.ttl_secs)
        .build()?;

    let not_found = CustomErrorResponse::builder()
        .error_code(404)
        .response_code("404")
        .response_page_path(&spec.error_page_path)
        .build()?;

    DistributionConfig::builder()
        .caller_reference(&spec.caller_reference)
        .comment(&spec.comment)
        .enabled(spec.enabled)
        .origins(Origins::builder().quantity(1).items(origin).build()?)
        .default_cache_behavior(behavior)
        .custom_error_responses(
            CustomErrorResponses::builder()
                .quantity(1)
                .items(not_found)
                .build()?,
        )
        .price_class(PriceClass::from(spec.price_class))
        .restrictions(
            Restrictions::builder()
                .geo_restriction(
                    GeoRestriction::builder()
                        .restriction_type(GeoRestrictionType::from("none"))
                        .quantity(0)
                        .build()?,
                )
                .build(),
        )
        .viewer_certificate(
            ViewerCertificate::builder()
                .cloud_front_default_certificate(true)
                .build(),
        )
        .build()
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    #[instrument(skip(self, request), fields(distribution = %request.distribution_id))]
    async fn create_invalidation(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationReceipt, CdnError> {
        const OP: &str = "CreateInvalidation";
        let paths = Paths::builder()
            .quantity(request.paths.len() as i32)
            .set_items(Some(request.paths.clone()))
            .build()
            .map_err(build_err(OP))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(&request.caller_reference)
            .build()
            .map_err(build_err(OP))?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(&request.distribution_id.0)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(api_err(OP))?;
        let invalidation = output
            .invalidation()
            .ok_or_else(|| CdnError::api(OP, "response carried no invalidation"))?;
        Ok(InvalidationReceipt {
            id: invalidation.id().to_string(),
            status: invalidation.status().to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn get_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionInfo>, CdnError> {
        const OP: &str = "GetDistribution";
        let output = match self.client.get_distribution().id(&id.0).send().await {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(api_err(OP)(err)),
        };
        let distribution = output
            .distribution()
            .ok_or_else(|| CdnError::api(OP, "response carried no distribution"))?;
        let enabled = distribution
            .distribution_config()
            .map(|c| c.enabled())
            .unwrap_or(false);

        Ok(Some(DistributionInfo {
            id: DistributionId(distribution.id().to_string()),
            domain_name: distribution.domain_name().to_string(),
            enabled,
            status: distribution.status().to_string(),
        }))
    }

    #[instrument(skip(self, spec), fields(caller_reference = %spec.caller_reference))]
    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> Result<DistributionInfo, CdnError> {
        const OP: &str = "CreateDistribution";
        let config = distribution_config(spec).map_err(build_err(OP))?;
        let output = self
            .client
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(api_err(OP))?;
        let distribution = output
            .distribution()
            .ok_or_else(|| CdnError::api(OP, "response carried no distribution"))?;

        Ok(DistributionInfo {
            id: DistributionId(distribution.id().to_string()),
            domain_name: distribution.domain_name().to_string(),
            enabled: spec.enabled,
            status: distribution.status().to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn set_enabled(&self, id: &DistributionId, enabled: bool) -> Result<(), CdnError> {
        const OP: &str = "UpdateDistribution";
        let current = self
            .client
            .get_distribution_config()
            .id(&id.0)
            .send()
            .await
            .map_err(api_err("GetDistributionConfig"))?;
        let etag = current.e_tag;
        let mut config = current
            .distribution_config
            .ok_or_else(|| CdnError::api(OP, "response carried no distribution config"))?;
        config.enabled = enabled;

        self.client
            .update_distribution()
            .id(&id.0)
            .set_if_match(etag)
            .distribution_config(config)
            .send()
            .await
            .map_err(api_err(OP))?;
        Ok(())
    }
}
