pub mod args;
pub mod config;
pub mod plan;
pub mod publish;

use std::future::Future;

use anyhow::{Context, Result};

/// Run `fut` to completion on a fresh multi-thread runtime.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    Ok(runtime.block_on(fut))
}
