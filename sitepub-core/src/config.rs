//! Deploy configuration.
//!
//! # Resolution order
//!
//! ```text
//! built-in defaults  <  sitepub.yaml  <  command-line flags
//! ```
//!
//! Every layer is a [`ConfigFile`]; [`ConfigFile::overlay`] merges two layers
//! and [`DeployConfig::resolve`] turns the merged layer into the immutable
//! per-run [`DeployConfig`]. Nothing downstream reads the environment or the
//! working directory again.
//!
//! # API pattern
//!
//! `resolve` takes an explicit `base_dir` that relative paths are joined to.
//! The CLI passes the current directory; tests pass a `TempDir`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{Acl, BucketName, DistributionId, DocumentName, PrivateAcl};

pub const CONFIG_FILE_NAME: &str = "sitepub.yaml";
pub const DEFAULT_SOURCE_DIR: &str = "hugo";
pub const DEFAULT_DEPLOY_SUBDIR: &str = "public";
pub const DEFAULT_INDEX_DOC: &str = "index.html";
pub const DEFAULT_ERROR_DOC: &str = "404.html";
pub const DEFAULT_GENERATOR: &str = "hugo";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const STATE_DIR_NAME: &str = ".sitepub";

// ---------------------------------------------------------------------------
// 1. Config layer (file or CLI)
// ---------------------------------------------------------------------------

/// One layer of optional settings, as written in `sitepub.yaml`.
///
/// Key names follow the original deploy scripts: `buildDir`/`hugoDir` name
/// the generator *input* and `siteDir` the generator output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub build: Option<bool>,
    pub public: Option<bool>,
    #[serde(alias = "buildDir", alias = "hugoDir")]
    pub source_dir: Option<PathBuf>,
    #[serde(alias = "siteDir")]
    pub deploy_dir: Option<PathBuf>,
    pub index_doc: Option<String>,
    pub error_doc: Option<String>,
    pub private_acl: Option<PrivateAcl>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub distribution_id: Option<String>,
    pub generator: Option<String>,
    pub generator_args: Option<Vec<String>>,
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub state_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Load a config file. An empty file is an empty layer.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `<dir>/sitepub.yaml` if present, otherwise an empty layer.
    pub fn discover_at(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_at(&path)
    }

    /// Merge `top` over `self`: every field set in `top` wins.
    pub fn overlay(self, top: ConfigFile) -> ConfigFile {
        ConfigFile {
            build: top.build.or(self.build),
            public: top.public.or(self.public),
            source_dir: top.source_dir.or(self.source_dir),
            deploy_dir: top.deploy_dir.or(self.deploy_dir),
            index_doc: top.index_doc.or(self.index_doc),
            error_doc: top.error_doc.or(self.error_doc),
            private_acl: top.private_acl.or(self.private_acl),
            bucket: top.bucket.or(self.bucket),
            region: top.region.or(self.region),
            endpoint: top.endpoint.or(self.endpoint),
            distribution_id: top.distribution_id.or(self.distribution_id),
            generator: top.generator.or(self.generator),
            generator_args: top.generator_args.or(self.generator_args),
            concurrency: top.concurrency.or(self.concurrency),
            max_attempts: top.max_attempts.or(self.max_attempts),
            state_dir: top.state_dir.or(self.state_dir),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Resolved config
// ---------------------------------------------------------------------------

/// Immutable configuration for one publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    /// Generator input directory.
    pub source_dir: PathBuf,
    /// Generator output directory; the sync source.
    pub build_dir: PathBuf,
    pub build: bool,
    pub public_read: bool,
    pub private_acl: PrivateAcl,
    pub index_document: DocumentName,
    pub error_document: DocumentName,
    pub dry_run: bool,
    pub bucket: BucketName,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub distribution_id: Option<DistributionId>,
    pub generator: String,
    pub generator_args: Vec<String>,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub state_dir: PathBuf,
}

impl DeployConfig {
    /// Resolve a merged layer into a validated config.
    ///
    /// All validation happens here, before any side effect, dry-run included.
    /// When the generator will not run this also checks that the deploy
    /// directory is ready to sync.
    pub fn resolve(
        base_dir: &Path,
        layer: ConfigFile,
        dry_run: bool,
    ) -> Result<Self, ConfigError> {
        let bucket = layer
            .bucket
            .filter(|b| !b.trim().is_empty())
            .ok_or(ConfigError::MissingBucket)
            .and_then(BucketName::parse)?;

        let index_document = DocumentName::parse(
            "indexDoc",
            layer.index_doc.unwrap_or_else(|| DEFAULT_INDEX_DOC.to_string()),
        )?;
        let error_document = DocumentName::parse(
            "errorDoc",
            layer.error_doc.unwrap_or_else(|| DEFAULT_ERROR_DOC.to_string()),
        )?;

        let concurrency = layer.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        let max_attempts = layer.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxAttempts",
                reason: "must be at least 1".to_string(),
            });
        }

        let generator = layer
            .generator
            .unwrap_or_else(|| DEFAULT_GENERATOR.to_string());
        if generator.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "generator",
                reason: "must name an executable".to_string(),
            });
        }

        let source_dir = absolutize(
            base_dir,
            layer
                .source_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR)),
        );
        // Relative deploy dirs follow the generator's `--destination` semantics.
        let build_dir = absolutize(
            &source_dir,
            layer
                .deploy_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOY_SUBDIR)),
        );
        let state_dir = absolutize(
            base_dir,
            layer
                .state_dir
                .unwrap_or_else(|| PathBuf::from(STATE_DIR_NAME)),
        );

        let config = Self {
            source_dir,
            build_dir,
            build: layer.build.unwrap_or(true),
            public_read: layer.public.unwrap_or(false),
            private_acl: layer.private_acl.unwrap_or_default(),
            index_document,
            error_document,
            dry_run,
            bucket,
            region: layer.region.filter(|r| !r.trim().is_empty()),
            endpoint: layer.endpoint.filter(|e| !e.trim().is_empty()),
            distribution_id: layer
                .distribution_id
                .filter(|d| !d.trim().is_empty())
                .map(DistributionId::from),
            generator,
            generator_args: layer.generator_args.unwrap_or_default(),
            concurrency,
            max_attempts,
            state_dir,
        };

        if config.build && !config.source_dir.is_dir() {
            return Err(ConfigError::SourceDirMissing {
                path: config.source_dir.clone(),
            });
        }
        if !config.will_build() {
            config.ensure_deploy_dir_ready()?;
        }
        Ok(config)
    }

    /// Whether the generator subprocess will actually be spawned.
    pub fn will_build(&self) -> bool {
        self.build && !self.dry_run
    }

    /// ACL applied to uploaded objects.
    pub fn acl(&self) -> Acl {
        Acl::select(self.public_read, self.private_acl)
    }

    /// The deploy directory must exist and contain at least one file.
    pub fn ensure_deploy_dir_ready(&self) -> Result<(), ConfigError> {
        let path = &self.build_dir;
        if !path.is_dir() {
            return Err(ConfigError::DeployDirMissing { path: path.clone() });
        }
        if !contains_file(path)? {
            return Err(ConfigError::DeployDirEmpty { path: path.clone() });
        }
        Ok(())
    }

    /// Snapshot of the resolved settings, exported with the run outputs.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            build: self.build,
            public: self.public_read,
            dry_run: self.dry_run,
            source_dir: self.source_dir.clone(),
            deploy_dir: self.build_dir.clone(),
            index_doc: self.index_document.to_string(),
            error_doc: self.error_document.to_string(),
            acl: self.acl(),
            bucket: self.bucket.to_string(),
            region: self.region.clone(),
            distribution_id: self.distribution_id.as_ref().map(|d| d.0.clone()),
            generator: self.generator.clone(),
        }
    }
}

/// Serializable view of a [`DeployConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub build: bool,
    pub public: bool,
    pub dry_run: bool,
    pub source_dir: PathBuf,
    pub deploy_dir: PathBuf,
    pub index_doc: String,
    pub error_doc: String,
    pub acl: Acl,
    pub bucket: String,
    pub region: Option<String>,
    pub distribution_id: Option<String>,
    pub generator: String,
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn contains_file(dir: &Path) -> Result<bool, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            if contains_file(&path)? {
                return Ok(true);
            }
        } else {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn layer(bucket: &str) -> ConfigFile {
        ConfigFile {
            bucket: Some(bucket.to_string()),
            ..ConfigFile::default()
        }
    }

    fn site_with_output(root: &Path) {
        let public = root.join("hugo").join("public");
        fs::create_dir_all(&public).unwrap();
        fs::write(public.join("index.html"), "<h1>hi</h1>").unwrap();
    }

    #[test]
    fn defaults_match_the_deploy_scripts() {
        let tmp = TempDir::new().unwrap();
        site_with_output(tmp.path());

        let config = DeployConfig::resolve(tmp.path(), layer("my-site"), false).unwrap();
        assert_eq!(config.source_dir, tmp.path().join("hugo"));
        assert_eq!(config.build_dir, tmp.path().join("hugo").join("public"));
        assert!(config.build);
        assert!(!config.public_read);
        assert_eq!(config.index_document.as_str(), "index.html");
        assert_eq!(config.error_document.as_str(), "404.html");
        assert_eq!(config.acl(), Acl::Private);
        assert_eq!(config.generator, "hugo");
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.state_dir, tmp.path().join(".sitepub"));
    }

    #[test]
    fn top_layer_wins_on_overlay() {
        let file = ConfigFile {
            public: Some(false),
            index_doc: Some("home.html".into()),
            bucket: Some("from-file".into()),
            ..ConfigFile::default()
        };
        let cli = ConfigFile {
            public: Some(true),
            bucket: Some("from-cli".into()),
            ..ConfigFile::default()
        };
        let merged = file.overlay(cli);
        assert_eq!(merged.public, Some(true));
        assert_eq!(merged.bucket.as_deref(), Some("from-cli"));
        assert_eq!(merged.index_doc.as_deref(), Some("home.html"));
    }

    #[test]
    fn missing_bucket_is_reported_before_paths() {
        let tmp = TempDir::new().unwrap();
        let err = DeployConfig::resolve(tmp.path(), ConfigFile::default(), true).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBucket), "got: {err}");
    }

    #[test]
    fn missing_source_dir_fails_even_in_dry_run() {
        let tmp = TempDir::new().unwrap();
        let err = DeployConfig::resolve(tmp.path(), layer("my-site"), true).unwrap_err();
        assert!(matches!(err, ConfigError::SourceDirMissing { .. }), "got: {err}");
    }

    #[test]
    fn empty_deploy_dir_rejected_when_not_building() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("hugo").join("public").join("nested")).unwrap();

        let mut settings = layer("my-site");
        settings.build = Some(false);
        let err = DeployConfig::resolve(tmp.path(), settings, false).unwrap_err();
        assert!(matches!(err, ConfigError::DeployDirEmpty { .. }), "got: {err}");
    }

    #[test]
    fn deploy_dir_not_checked_when_generator_will_run() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("hugo")).unwrap();

        let config = DeployConfig::resolve(tmp.path(), layer("my-site"), false).unwrap();
        assert!(config.will_build());
        assert!(config.ensure_deploy_dir_ready().is_err());
    }

    #[test]
    fn relative_deploy_dir_resolves_against_source_dir() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("site").join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("index.html"), "x").unwrap();

        let settings = ConfigFile {
            bucket: Some("my-site".into()),
            source_dir: Some("site".into()),
            deploy_dir: Some("dist".into()),
            build: Some(false),
            ..ConfigFile::default()
        };
        let config = DeployConfig::resolve(tmp.path(), settings, false).unwrap();
        assert_eq!(config.build_dir, out);
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let mut settings = layer("my-site");
        settings.concurrency = Some(0);
        let err = DeployConfig::resolve(tmp.path(), settings, false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "concurrency", .. }));
    }

    #[test]
    fn summary_reports_effective_acl() {
        let tmp = TempDir::new().unwrap();
        site_with_output(tmp.path());
        let mut settings = layer("my-site");
        settings.private_acl = Some(PrivateAcl::AuthenticatedRead);

        let summary = DeployConfig::resolve(tmp.path(), settings, true)
            .unwrap()
            .summary();
        assert_eq!(summary.acl, Acl::AuthenticatedRead);
        assert!(summary.dry_run);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["errorDoc"], "404.html");
        assert_eq!(json["acl"], "authenticated-read");
    }
}
