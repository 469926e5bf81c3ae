//! # sitepub-build
//!
//! Runs the static-site generator that produces the deploy directory.
//!
//! Call [`run`] with a resolved [`sitepub_core::DeployConfig`]; it either
//! spawns the generator or reports why the build was skipped.

mod builder;
mod error;

pub use builder::{generator_command, run, BuildOutcome, SkipReason};
pub use error::BuildError;
