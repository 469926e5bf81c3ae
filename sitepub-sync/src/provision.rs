//! Bucket preparation for static website hosting.

use serde::Serialize;

use sitepub_core::DeployConfig;

use crate::error::{ProvisionError, StoreError};
use crate::store::BucketAdmin;

/// Regions whose website endpoint uses `s3-website-<region>` rather than
/// `s3-website.<region>`.
const DASH_ENDPOINT_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "sa-east-1",
    "us-gov-west-1",
];

/// A bucket ready to serve the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub bucket: String,
    pub website_endpoint: String,
    pub policy_applied: bool,
}

impl BucketInfo {
    pub fn website_url(&self) -> String {
        if self.website_endpoint.contains("://") {
            self.website_endpoint.clone()
        } else {
            format!("http://{}", self.website_endpoint)
        }
    }
}

/// Host name of the S3 website endpoint for `bucket` in `region`.
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    if DASH_ENDPOINT_REGIONS.contains(&region) {
        format!("{bucket}.s3-website-{region}.amazonaws.com")
    } else {
        format!("{bucket}.s3-website.{region}.amazonaws.com")
    }
}

/// Bucket policy granting anonymous `s3:GetObject` on every key.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/*")],
        }],
    })
    .to_string()
}

/// Create and configure the bucket. Every call is idempotent.
///
/// A private site gets no bucket policy; one left over from an earlier
/// public deploy is removed.
pub async fn ensure_bucket(
    admin: &dyn BucketAdmin,
    config: &DeployConfig,
) -> Result<BucketInfo, ProvisionError> {
    let bucket = admin.bucket().to_string();
    let api = |operation: &'static str| {
        let bucket = bucket.clone();
        move |source: StoreError| ProvisionError::Api {
            operation,
            bucket,
            source,
        }
    };

    if admin.bucket_exists().await.map_err(api("HeadBucket"))? {
        tracing::debug!(bucket = %bucket, "bucket exists");
    } else {
        admin.create_bucket().await.map_err(api("CreateBucket"))?;
        tracing::info!(bucket = %bucket, "created bucket");
    }

    admin
        .put_website(&config.index_document, &config.error_document)
        .await
        .map_err(api("PutBucketWebsite"))?;
    admin
        .put_ownership_object_writer()
        .await
        .map_err(api("PutBucketOwnershipControls"))?;
    admin
        .open_public_access_block()
        .await
        .map_err(api("PutPublicAccessBlock"))?;

    if config.public_read {
        admin
            .put_policy(&public_read_policy(&bucket))
            .await
            .map_err(api("PutBucketPolicy"))?;
        tracing::info!(bucket = %bucket, "public-read bucket policy applied");
    } else {
        admin
            .delete_policy()
            .await
            .map_err(api("DeleteBucketPolicy"))?;
    }

    Ok(BucketInfo {
        website_endpoint: admin.website_endpoint(),
        bucket,
        policy_applied: config.public_read,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("us-east-1", "my-site.s3-website-us-east-1.amazonaws.com")]
    #[case("eu-west-1", "my-site.s3-website-eu-west-1.amazonaws.com")]
    #[case("us-gov-west-1", "my-site.s3-website-us-gov-west-1.amazonaws.com")]
    #[case("eu-central-1", "my-site.s3-website.eu-central-1.amazonaws.com")]
    #[case("ap-south-1", "my-site.s3-website.ap-south-1.amazonaws.com")]
    fn endpoint_form_depends_on_region(#[case] region: &str, #[case] expected: &str) {
        assert_eq!(website_endpoint("my-site", region), expected);
    }

    #[test]
    fn policy_grants_get_object_on_bucket_keys() {
        let policy: serde_json::Value =
            serde_json::from_str(&public_read_policy("my-site")).unwrap();
        let statement = &policy["Statement"][0];
        assert_eq!(policy["Version"], "2012-10-17");
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Principal"], "*");
        assert_eq!(statement["Action"][0], "s3:GetObject");
        assert_eq!(statement["Resource"][0], "arn:aws:s3:::my-site/*");
    }

    #[test]
    fn website_url_adds_scheme_once() {
        let info = BucketInfo {
            bucket: "my-site".into(),
            website_endpoint: "my-site.s3-website-us-east-1.amazonaws.com".into(),
            policy_applied: true,
        };
        assert_eq!(
            info.website_url(),
            "http://my-site.s3-website-us-east-1.amazonaws.com"
        );

        let local = BucketInfo {
            website_endpoint: "http://localhost:9000/my-site".into(),
            ..info
        };
        assert_eq!(local.website_url(), "http://localhost:9000/my-site");
    }
}
