//! `sitepub plan`: show what the mirror step would do.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use sitepub_core::Acl;
use sitepub_deploy::aws;
use sitepub_sync::{prepare_plan, MirrorOptions, SyncAction, SyncPlan, UploadReason};

use super::args::DeployArgs;
use super::block_on;

/// Arguments for `sitepub plan`.
///
/// Reads the bucket listing but never writes to it. The generator is not run;
/// the plan covers whatever is in the deploy directory now.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let config = self.deploy.resolve()?;
        config
            .ensure_deploy_dir_ready()
            .context("nothing to plan; build the site first")?;

        let options = MirrorOptions::from_config(&config);
        let plan = block_on(async {
            let services = aws::connect(&config).await;
            prepare_plan(services.store.as_ref(), &options).await
        })?
        .with_context(|| format!("failed to plan sync to bucket '{}'", config.bucket))?;

        if self.json {
            let json = serde_json::to_string_pretty(&PlanView::from(&plan))
                .context("failed to serialize plan")?;
            println!("{json}");
            return Ok(());
        }
        print_plan(&plan);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanView {
    acl: Acl,
    uploads: Vec<UploadView>,
    deletes: Vec<String>,
    unchanged: usize,
}

#[derive(Serialize)]
struct UploadView {
    key: String,
    reason: UploadReason,
    size: u64,
}

impl From<&SyncPlan> for PlanView {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            acl: plan.acl,
            uploads: plan
                .uploads()
                .map(|(file, reason)| UploadView {
                    key: file.key.clone(),
                    reason,
                    size: file.size,
                })
                .collect(),
            deletes: plan.deletes().map(str::to_string).collect(),
            unchanged: plan.unchanged_count(),
        }
    }
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "")]
    mark: String,
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "why")]
    why: String,
}

fn print_plan(plan: &SyncPlan) {
    if plan.is_noop() {
        println!(
            "{} bucket is up to date ({} objects, acl {})",
            "■".green().bold(),
            plan.unchanged_count(),
            plan.acl
        );
        return;
    }

    let rows: Vec<PlanRow> = plan
        .actions
        .iter()
        .filter_map(|action| match action {
            SyncAction::Upload { file, reason } => Some(PlanRow {
                mark: "+".green().bold().to_string(),
                key: file.key.clone(),
                why: reason_label(*reason).to_string(),
            }),
            SyncAction::Delete { key } => Some(PlanRow {
                mark: "-".red().bold().to_string(),
                key: key.clone(),
                why: "not in deploy dir".to_string(),
            }),
            SyncAction::Unchanged { .. } => None,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} to upload, {} to delete, {} unchanged (acl {})",
        plan.uploads().count(),
        plan.deletes().count(),
        plan.unchanged_count(),
        plan.acl
    );
}

fn reason_label(reason: UploadReason) -> &'static str {
    match reason {
        UploadReason::New => "new",
        UploadReason::Changed => "changed",
        UploadReason::Untracked => "untracked",
        UploadReason::AclChanged => "acl changed",
    }
}
