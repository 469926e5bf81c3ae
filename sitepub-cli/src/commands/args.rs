//! Config flags shared by every subcommand.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sitepub_core::{ConfigFile, DeployConfig, PrivateAcl};

/// Deploy settings. Every flag overrides the matching `sitepub.yaml` key.
#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Config file to read instead of `./sitepub.yaml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Generator input directory.
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Generator output directory; relative paths resolve against the source dir.
    #[arg(long, value_name = "DIR")]
    pub deploy_dir: Option<PathBuf>,

    /// Site generator executable.
    #[arg(long, value_name = "EXE")]
    pub generator: Option<String>,

    /// Extra argument passed to the generator (repeatable).
    #[arg(long = "generator-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub generator_args: Vec<String>,

    /// Sync the deploy directory as-is without running the generator.
    #[arg(long)]
    pub no_build: bool,

    /// Serve the site publicly (public-read objects, bucket policy, CDN enabled).
    #[arg(long, conflicts_with = "private")]
    pub public: bool,

    /// Keep the site private even if the config file says otherwise.
    #[arg(long)]
    pub private: bool,

    /// ACL for objects of a private site.
    #[arg(long, value_name = "private|authenticated-read")]
    pub private_acl: Option<PrivateAcl>,

    #[arg(long, value_name = "FILE")]
    pub index_doc: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub error_doc: Option<String>,

    /// Target bucket.
    #[arg(long)]
    pub bucket: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    /// S3-compatible endpoint URL (MinIO, LocalStack).
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Reuse this CDN distribution instead of the recorded or a new one.
    #[arg(long, value_name = "ID")]
    pub distribution_id: Option<String>,

    /// Parallel transfers.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Attempts per transfer, including the first.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Skip the generator and the cache invalidation.
    #[arg(long)]
    pub dry_run: bool,
}

impl DeployArgs {
    /// The command-line layer.
    pub fn layer(&self) -> ConfigFile {
        ConfigFile {
            build: self.no_build.then_some(false),
            public: if self.public {
                Some(true)
            } else if self.private {
                Some(false)
            } else {
                None
            },
            source_dir: self.source_dir.clone(),
            deploy_dir: self.deploy_dir.clone(),
            index_doc: self.index_doc.clone(),
            error_doc: self.error_doc.clone(),
            private_acl: self.private_acl,
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            distribution_id: self.distribution_id.clone(),
            generator: self.generator.clone(),
            generator_args: (!self.generator_args.is_empty()).then(|| self.generator_args.clone()),
            concurrency: self.concurrency,
            max_attempts: self.max_attempts,
            state_dir: None,
        }
    }

    /// Defaults < config file < flags, resolved against the working directory.
    pub fn resolve(&self) -> Result<DeployConfig> {
        let cwd = std::env::current_dir().context("could not determine working directory")?;
        let file = match &self.config {
            Some(path) => ConfigFile::load_at(path)?,
            None => ConfigFile::discover_at(&cwd)?,
        };
        let config = DeployConfig::resolve(&cwd, file.overlay(self.layer()), self.dry_run)
            .context("invalid configuration")?;
        Ok(config)
    }
}
