//! # sitepub-deploy
//!
//! The publish pipeline. [`publish`] drives a resolved
//! [`sitepub_core::DeployConfig`] through build, bucket provisioning, mirror,
//! distribution setup and invalidation, tracking each step in a
//! [`PublishState`] machine.
//!
//! [`aws::connect`] builds the production [`Services`]; tests pass in-memory
//! doubles instead.

pub mod aws;
pub mod error;
pub mod outputs;
pub mod pipeline;
pub mod state;

pub use error::PublishError;
pub use outputs::PublishOutputs;
pub use pipeline::{publish, Services};
pub use state::{PublishState, Stage, StateTracker};
