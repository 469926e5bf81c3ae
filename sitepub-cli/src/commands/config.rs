//! `sitepub config`: print the resolved configuration.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use sitepub_core::ConfigSummary;

use super::args::DeployArgs;

/// Arguments for `sitepub config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let summary = self.deploy.resolve()?.summary();
        if self.json {
            let json =
                serde_json::to_string_pretty(&summary).context("failed to serialize config")?;
            println!("{json}");
            return Ok(());
        }
        print_table(&summary);
        Ok(())
    }
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "setting")]
    key: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn print_table(summary: &ConfigSummary) {
    let unset = || "-".to_string();
    let rows = vec![
        row("bucket", summary.bucket.clone()),
        row("region", summary.region.clone().unwrap_or_else(unset)),
        row("public", summary.public.to_string()),
        row("acl", summary.acl.to_string()),
        row("build", summary.build.to_string()),
        row("generator", summary.generator.clone()),
        row("source dir", summary.source_dir.display().to_string()),
        row("deploy dir", summary.deploy_dir.display().to_string()),
        row("index doc", summary.index_doc.clone()),
        row("error doc", summary.error_doc.clone()),
        row(
            "distribution",
            summary.distribution_id.clone().unwrap_or_else(unset),
        ),
        row("dry run", summary.dry_run.to_string()),
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn row(key: &'static str, value: String) -> SettingRow {
    SettingRow { key, value }
}
