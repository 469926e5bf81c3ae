use serde::Serialize;

use sitepub_cdn::InvalidationOutcome;
use sitepub_core::ConfigSummary;
use sitepub_sync::SyncReport;

use crate::state::PublishState;

/// Everything a finished run exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutputs {
    pub bucket: String,
    pub website_endpoint: String,
    pub website_url: String,
    pub distribution_id: String,
    pub cdn_hostname: String,
    pub cdn_url: String,
    /// `false` when the distribution is disabled because the site is private.
    pub cdn_enabled: bool,
    pub config: ConfigSummary,
    /// `false` when the generator was skipped.
    pub built: bool,
    pub sync: SyncReport,
    /// `None` when the invalidation request failed; see `state`.
    pub invalidation: Option<InvalidationOutcome>,
    pub state: PublishState,
    pub history: Vec<PublishState>,
}

impl PublishOutputs {
    /// The warning a run finished with, if any.
    pub fn warning(&self) -> Option<&str> {
        match &self.state {
            PublishState::Done { warning } => warning.as_deref(),
            _ => None,
        }
    }
}
