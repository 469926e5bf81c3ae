//! S3 backend using the AWS SDK.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::{BuildError, DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, ErrorDocument, IndexDocument,
    ObjectCannedAcl, ObjectOwnership, OwnershipControls, OwnershipControlsRule,
    PublicAccessBlockConfiguration, WebsiteConfiguration,
};
use aws_sdk_s3::Client;
use tracing::instrument;

use sitepub_core::{BucketName, DocumentName};

use crate::error::{StoreError, StoreResult};
use crate::provision;
use crate::store::{BucketAdmin, ObjectStore, PutObject, RemoteObject};

/// Region used when neither the config nor the environment names one.
pub const FALLBACK_REGION: &str = "us-east-1";

/// One bucket reached through the S3 API.
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
    /// Normalized custom endpoint (MinIO, LocalStack), if any.
    endpoint: Option<String>,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Build a client from shared SDK config.
    ///
    /// A custom `endpoint` switches to path-style addressing, which
    /// S3-compatible servers require. Bare `host:port` values get `http://`.
    pub fn new(sdk: &SdkConfig, bucket: &BucketName, endpoint: Option<&str>) -> Self {
        let endpoint = endpoint.map(|url| {
            let lower = url.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                url.trim_end_matches('/').to_string()
            } else {
                format!("http://{}", url.trim_end_matches('/'))
            }
        });

        let mut builder = aws_sdk_s3::config::Builder::from(sdk);
        if let Some(url) = &endpoint {
            builder = builder.endpoint_url(url).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            region: sdk
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| FALLBACK_REGION.to_string()),
            endpoint,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Sort an SDK failure into retryable and final.
///
/// Timeouts, dispatch failures, unreadable responses, 5xx and 429 are
/// transient. Every other service response is a rejection.
fn classify<E>(err: SdkError<E>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transient(message)
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            if status >= 500 || status == 429 {
                StoreError::Transient(message)
            } else {
                StoreError::Rejected {
                    status: Some(status),
                    message,
                }
            }
        }
        _ => StoreError::Rejected {
            status: None,
            message,
        },
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(service) if service.raw().status().as_u16() == 404)
}

fn invalid_request(err: BuildError) -> StoreError {
    StoreError::Rejected {
        status: None,
        message: err.to_string(),
    }
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self) -> StoreResult<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(classify)?;
            for obj in output.contents() {
                if let Some(key) = obj.key() {
                    objects.push(RemoteObject {
                        key: key.to_string(),
                        etag: obj.e_tag().map(trim_etag).unwrap_or_default(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(objects)
    }

    #[instrument(skip(self, object), fields(bucket = %self.bucket, key = %object.key, size = object.body.len()))]
    async fn put(&self, object: &PutObject) -> StoreResult<String> {
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .body(ByteStream::from(object.body.clone()))
            .content_type(object.content_type)
            .acl(ObjectCannedAcl::from(object.acl.as_str()))
            .send()
            .await
            .map_err(classify)?;
        Ok(output.e_tag().map(trim_etag).unwrap_or_default())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl BucketAdmin for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn website_endpoint(&self) -> String {
        match &self.endpoint {
            Some(url) => format!("{url}/{}", self.bucket),
            None => provision::website_endpoint(&self.bucket, &self.region),
        }
    }

    async fn bucket_exists(&self) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(classify(err)),
        }
    }

    async fn create_bucket(&self) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        // us-east-1 rejects an explicit location constraint.
        if self.endpoint.is_none() && self.region != FALLBACK_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(service))
                if service.err().is_bucket_already_owned_by_you() =>
            {
                Ok(())
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn put_website(&self, index: &DocumentName, error: &DocumentName) -> StoreResult<()> {
        let website = WebsiteConfiguration::builder()
            .index_document(
                IndexDocument::builder()
                    .suffix(index.as_str())
                    .build()
                    .map_err(invalid_request)?,
            )
            .error_document(
                ErrorDocument::builder()
                    .key(error.as_str())
                    .build()
                    .map_err(invalid_request)?,
            )
            .build();

        self.client
            .put_bucket_website()
            .bucket(&self.bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn put_ownership_object_writer(&self) -> StoreResult<()> {
        let rule = OwnershipControlsRule::builder()
            .object_ownership(ObjectOwnership::ObjectWriter)
            .build()
            .map_err(invalid_request)?;
        let controls = OwnershipControls::builder()
            .rules(rule)
            .build()
            .map_err(invalid_request)?;

        self.client
            .put_bucket_ownership_controls()
            .bucket(&self.bucket)
            .ownership_controls(controls)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn open_public_access_block(&self) -> StoreResult<()> {
        let block = PublicAccessBlockConfiguration::builder()
            .block_public_acls(false)
            .ignore_public_acls(false)
            .block_public_policy(false)
            .restrict_public_buckets(false)
            .build();

        self.client
            .put_public_access_block()
            .bucket(&self.bucket)
            .public_access_block_configuration(block)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn put_policy(&self, policy: &str) -> StoreResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(policy)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_policy(&self) -> StoreResult<()> {
        match self
            .client
            .delete_bucket_policy()
            .bucket(&self.bucket)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(classify(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_s3::operation::put_object::PutObjectError;
    use aws_smithy_runtime_api::client::result::ConnectorError;
    use aws_smithy_runtime_api::http::{Response, StatusCode};
    use aws_smithy_types::body::SdkBody;
    use rstest::rstest;

    fn sdk(region: &str) -> SdkConfig {
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .build()
    }

    fn bucket() -> BucketName {
        BucketName::parse("my-site").unwrap()
    }

    #[test]
    fn website_endpoint_follows_region() {
        let store = S3Store::new(&sdk("eu-central-1"), &bucket(), None);
        assert_eq!(store.region(), "eu-central-1");
        assert_eq!(
            store.website_endpoint(),
            "my-site.s3-website.eu-central-1.amazonaws.com"
        );
    }

    #[test]
    fn custom_endpoint_is_normalized() {
        let store = S3Store::new(&sdk("us-east-1"), &bucket(), Some("localhost:9000/"));
        assert_eq!(store.website_endpoint(), "http://localhost:9000/my-site");
    }

    #[test]
    fn etag_quotes_are_trimmed() {
        assert_eq!(trim_etag("\"abc123\""), "abc123");
        assert_eq!(trim_etag("abc123"), "abc123");
    }

    fn service_failure(status: u16) -> SdkError<PutObjectError> {
        SdkError::service_error(
            PutObjectError::unhandled("injected"),
            Response::new(
                StatusCode::try_from(status).expect("valid status"),
                SdkBody::empty(),
            ),
        )
    }

    #[rstest]
    #[case(500)]
    #[case(503)]
    #[case(429)]
    fn server_errors_and_throttling_are_retried(#[case] status: u16) {
        let err = classify(service_failure(status));
        assert!(matches!(err, StoreError::Transient(_)), "{status}: {err:?}");
    }

    #[rstest]
    #[case(400)]
    #[case(403)]
    #[case(404)]
    fn client_errors_are_final(#[case] status: u16) {
        let err = classify(service_failure(status));
        assert!(
            matches!(err, StoreError::Rejected { status: Some(s), .. } if s == status),
            "{status}: {err:?}"
        );
    }

    #[test]
    fn timeouts_and_dispatch_failures_are_retried() {
        let timeout: SdkError<PutObjectError> = SdkError::timeout_error("deadline elapsed");
        assert!(matches!(classify(timeout), StoreError::Transient(_)));

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let dispatch: SdkError<PutObjectError> =
            SdkError::dispatch_failure(ConnectorError::io(Box::new(refused)));
        assert!(matches!(classify(dispatch), StoreError::Transient(_)));
    }
}
