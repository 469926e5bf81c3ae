//! `sitepub publish`: build, sync and invalidate.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use sitepub_cdn::{InvalidationOutcome, InvalidationSkip};
use sitepub_deploy::{aws, publish, PublishOutputs};

use super::args::DeployArgs;
use super::block_on;

/// Arguments for `sitepub publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Emit the run outputs as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PublishArgs {
    pub fn run(self) -> Result<()> {
        let config = self.deploy.resolve()?;
        if config.dry_run {
            tracing::info!("dry run: generator and invalidation will be skipped");
        }

        let outputs = block_on(async {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, finishing in-flight transfers");
                    on_interrupt.cancel();
                }
            });

            let services = aws::connect(&config).await;
            publish(&config, &services, &cancel).await
        })?
        .with_context(|| format!("failed to publish to bucket '{}'", config.bucket))?;

        if self.json {
            let json =
                serde_json::to_string_pretty(&outputs).context("failed to serialize outputs")?;
            println!("{json}");
            return Ok(());
        }
        print_summary(&outputs);
        Ok(())
    }
}

fn print_summary(outputs: &PublishOutputs) {
    let build = if outputs.built {
        "built".green().bold()
    } else {
        "skipped".yellow().bold()
    };
    println!("{} build {build}", "■".green().bold());

    let sync = &outputs.sync;
    println!(
        "{} synced {}: {} uploaded, {} deleted, {} unchanged (acl {})",
        "■".green().bold(),
        outputs.bucket,
        sync.uploaded.len(),
        sync.deleted.len(),
        sync.unchanged,
        sync.acl
    );
    for key in &sync.uploaded {
        println!("  {}  {key}", "+".green());
    }
    for key in &sync.deleted {
        println!("  {}  {key}", "-".red());
    }

    match (&outputs.invalidation, outputs.warning()) {
        (Some(InvalidationOutcome::Accepted { id, status }), _) => println!(
            "{} invalidation {id} {}",
            "■".green().bold(),
            status.to_lowercase()
        ),
        (Some(InvalidationOutcome::Skipped { reason }), _) => println!(
            "{} invalidation skipped ({})",
            "■".yellow().bold(),
            skip_label(*reason)
        ),
        (None, Some(warning)) => println!(
            "{} invalidation failed, cached pages may be stale: {warning}",
            "■".red().bold()
        ),
        (None, None) => {}
    }

    println!();
    println!("website:      {}", outputs.website_url);
    let cdn_note = if outputs.cdn_enabled {
        String::new()
    } else {
        format!(" {}", "(disabled)".dimmed())
    };
    println!("cdn:          {}{cdn_note}", outputs.cdn_url);
    println!("distribution: {}", outputs.distribution_id);
}

fn skip_label(reason: InvalidationSkip) -> &'static str {
    match reason {
        InvalidationSkip::DryRun => "dry run",
        InvalidationSkip::Private => "private site",
        InvalidationSkip::NoDistribution => "no distribution",
    }
}
