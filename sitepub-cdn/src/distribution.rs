//! Distribution lookup and creation.
//!
//! The distribution id comes from the config, else from
//! `<state_dir>/<bucket>.distribution.json`, else a new distribution is
//! created in front of the bucket website endpoint and its id recorded there.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitepub_core::{persist, DeployConfig, DistributionId};

use crate::api::{Cdn, DistributionInfo};
use crate::error::CdnError;

pub const CACHE_TTL_SECS: i64 = 600;
pub const PRICE_CLASS: &str = "PriceClass_100";
pub const CACHED_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];
pub const ORIGIN_TLS_PROTOCOL: &str = "TLSv1.2";
pub const ORIGIN_HTTP_PORT: i32 = 80;
pub const ORIGIN_HTTPS_PORT: i32 = 443;

/// Settings for a new distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    /// `sitepub-<bucket>`; creating twice with it is rejected by the API.
    pub caller_reference: String,
    pub origin_id: String,
    /// Host name of the bucket website endpoint.
    pub origin_domain: String,
    /// Path served for 404s, e.g. `/404.html`.
    pub error_page_path: String,
    pub enabled: bool,
    pub comment: String,
    pub ttl_secs: i64,
    pub price_class: &'static str,
}

impl DistributionSpec {
    pub fn for_site(config: &DeployConfig, website_endpoint: &str) -> Self {
        let bucket = config.bucket.as_str();
        Self {
            caller_reference: format!("sitepub-{bucket}"),
            origin_id: format!("{bucket}-website"),
            origin_domain: origin_host(website_endpoint),
            error_page_path: format!("/{}", config.error_document),
            enabled: config.public_read,
            comment: format!("sitepub: {bucket}"),
            ttl_secs: CACHE_TTL_SECS,
            price_class: PRICE_CLASS,
        }
    }
}

/// `http://host:port/path` → `host:port`.
fn origin_host(endpoint: &str) -> String {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

/// The persisted id of the distribution created for a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionState {
    pub id: DistributionId,
    pub domain_name: String,
    pub created_at: DateTime<Utc>,
}

/// `<state_dir>/<bucket>.distribution.json`
pub fn state_path_at(state_dir: &Path, bucket: &str) -> PathBuf {
    state_dir.join(format!("{bucket}.distribution.json"))
}

pub fn load_state_at(state_dir: &Path, bucket: &str) -> Result<Option<DistributionState>, CdnError> {
    let path = state_path_at(state_dir, bucket);
    persist::load_json(&path).map_err(|source| CdnError::State { path, source })
}

pub fn save_state_at(
    state_dir: &Path,
    bucket: &str,
    state: &DistributionState,
) -> Result<(), CdnError> {
    let path = state_path_at(state_dir, bucket);
    persist::save_json(&path, state).map_err(|source| CdnError::State { path, source })
}

/// Find or create the distribution for this site, enabled iff it is public.
pub async fn ensure_distribution(
    cdn: &dyn Cdn,
    config: &DeployConfig,
    website_endpoint: &str,
) -> Result<DistributionInfo, CdnError> {
    let bucket = config.bucket.as_str();

    if let Some(id) = &config.distribution_id {
        let info = cdn
            .get_distribution(id)
            .await?
            .ok_or_else(|| CdnError::NotFound { id: id.to_string() })?;
        return reconcile(cdn, info, config.public_read).await;
    }

    if let Some(state) = load_state_at(&config.state_dir, bucket)? {
        match cdn.get_distribution(&state.id).await? {
            Some(info) => return reconcile(cdn, info, config.public_read).await,
            None => tracing::warn!(
                distribution = %state.id,
                "recorded distribution no longer exists, creating a new one"
            ),
        }
    }

    let spec = DistributionSpec::for_site(config, website_endpoint);
    let info = cdn.create_distribution(&spec).await?;
    tracing::info!(
        distribution = %info.id,
        domain = %info.domain_name,
        enabled = info.enabled,
        "created distribution"
    );
    save_state_at(
        &config.state_dir,
        bucket,
        &DistributionState {
            id: info.id.clone(),
            domain_name: info.domain_name.clone(),
            created_at: Utc::now(),
        },
    )?;
    Ok(info)
}

async fn reconcile(
    cdn: &dyn Cdn,
    mut info: DistributionInfo,
    enabled: bool,
) -> Result<DistributionInfo, CdnError> {
    if info.enabled != enabled {
        tracing::info!(distribution = %info.id, enabled, "updating distribution");
        cdn.set_enabled(&info.id, enabled).await?;
        info.enabled = enabled;
    } else {
        tracing::debug!(distribution = %info.id, "reusing distribution");
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCdn;
    use sitepub_core::ConfigFile;
    use std::fs;
    use tempfile::TempDir;

    fn config(tmp: &TempDir, public: bool, distribution_id: Option<&str>) -> DeployConfig {
        let public_dir = tmp.path().join("hugo").join("public");
        fs::create_dir_all(&public_dir).unwrap();
        fs::write(public_dir.join("index.html"), "x").unwrap();
        let layer = ConfigFile {
            bucket: Some("my-site".into()),
            public: Some(public),
            build: Some(false),
            distribution_id: distribution_id.map(str::to_string),
            ..ConfigFile::default()
        };
        DeployConfig::resolve(tmp.path(), layer, false).unwrap()
    }

    #[test]
    fn spec_uses_site_settings() {
        let tmp = TempDir::new().unwrap();
        let spec = DistributionSpec::for_site(
            &config(&tmp, true, None),
            "my-site.s3-website-us-east-1.amazonaws.com",
        );
        assert_eq!(spec.caller_reference, "sitepub-my-site");
        assert_eq!(spec.origin_domain, "my-site.s3-website-us-east-1.amazonaws.com");
        assert_eq!(spec.error_page_path, "/404.html");
        assert_eq!(spec.ttl_secs, 600);
        assert_eq!(spec.price_class, "PriceClass_100");
        assert!(spec.enabled);
    }

    #[test]
    fn origin_host_strips_scheme_and_path() {
        assert_eq!(origin_host("http://localhost:9000/my-site"), "localhost:9000");
        assert_eq!(origin_host("a.s3-website.eu-central-1.amazonaws.com"), "a.s3-website.eu-central-1.amazonaws.com");
    }

    #[tokio::test]
    async fn created_once_then_reused_from_state() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp, false, None);
        let cdn = MemoryCdn::new();

        let first = ensure_distribution(&cdn, &cfg, "my-site.example").await.unwrap();
        assert!(!first.enabled, "private sites get a disabled distribution");
        assert!(state_path_at(&cfg.state_dir, "my-site").exists());

        let second = ensure_distribution(&cdn, &cfg, "my-site.example").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(cdn.created().len(), 1);
    }

    #[tokio::test]
    async fn going_public_enables_existing_distribution() {
        let tmp = TempDir::new().unwrap();
        let cdn = MemoryCdn::new();
        let private = ensure_distribution(&cdn, &config(&tmp, false, None), "e")
            .await
            .unwrap();

        let public = ensure_distribution(&cdn, &config(&tmp, true, None), "e")
            .await
            .unwrap();
        assert_eq!(private.id, public.id);
        assert!(public.enabled);
        assert_eq!(cdn.enabled(&public.id), Some(true));
    }

    #[tokio::test]
    async fn unknown_configured_id_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let cdn = MemoryCdn::new();
        let err = ensure_distribution(&cdn, &config(&tmp, true, Some("EMISSING")), "e")
            .await
            .unwrap_err();
        assert!(matches!(err, CdnError::NotFound { ref id } if id == "EMISSING"));
        assert!(cdn.created().is_empty());
    }
}
