//! sitepub: build a static site and publish it to S3 behind CloudFront.
//!
//! # Usage
//!
//! ```text
//! sitepub publish [--bucket <name>] [--public] [--no-build] [--dry-run] [--json] ...
//! sitepub plan    [--bucket <name>] [--json] ...
//! sitepub config  [--bucket <name>] [--json] ...
//! ```
//!
//! Settings come from `sitepub.yaml` in the working directory (or
//! `--config <file>`); flags override the file.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, plan::PlanArgs, publish::PublishArgs};

#[derive(Parser, Debug)]
#[command(
    name = "sitepub",
    version,
    about = "Build a static site and publish it to an S3 bucket behind a CDN",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build, sync and invalidate.
    Publish(PublishArgs),

    /// Show what a publish would upload and delete, without writing anything.
    Plan(PlanArgs),

    /// Print the resolved configuration.
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Publish(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}

/// Log to stderr so stdout stays clean for summaries and `--json`.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
