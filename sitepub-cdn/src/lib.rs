//! # sitepub-cdn
//!
//! CDN distribution management and cache invalidation.
//!
//! [`invalidate::invalidate`] is the gate that decides whether a run sends
//! its single `/*` invalidation. [`distribution::ensure_distribution`] finds
//! or creates the distribution in front of the bucket. Both talk to the
//! [`api::Cdn`] trait, implemented by [`cloudfront::CloudFrontCdn`] and the
//! recording [`memory::MemoryCdn`].

pub mod api;
pub mod cloudfront;
pub mod distribution;
pub mod error;
pub mod invalidate;
pub mod memory;

pub use api::{Cdn, DistributionInfo, InvalidationReceipt, InvalidationRequest};
pub use cloudfront::CloudFrontCdn;
pub use distribution::{ensure_distribution, DistributionSpec};
pub use error::CdnError;
pub use invalidate::{invalidate, InvalidationOutcome, InvalidationSkip};
pub use memory::MemoryCdn;
