//! Publish run state machine.
//!
//! ```text
//! Idle → Building → Built ─────┐
//!            └─→ Skipped(build) ┴→ Syncing → Synced → Invalidating → Done
//!                                                        └─→ Skipped(invalidate) → Done
//! any step ─→ Failed
//! ```
//!
//! An invalidation failure ends in `Done` with a warning, never `Failed`.

use serde::Serialize;

/// The step a `Skipped` state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Build,
    Invalidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum PublishState {
    Idle,
    Building,
    Built,
    Syncing,
    Synced,
    Invalidating,
    Skipped { stage: Stage, reason: String },
    Failed { error: String },
    Done { warning: Option<String> },
}

impl PublishState {
    /// Whether `next` may follow `self`.
    pub fn allows(&self, next: &PublishState) -> bool {
        use PublishState::*;
        match (self, next) {
            (Done { .. } | Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (Idle, Building) => true,
            (Building, Built) => true,
            (Building, Skipped { stage: Stage::Build, .. }) => true,
            (Built | Skipped { stage: Stage::Build, .. }, Syncing) => true,
            (Syncing, Synced) => true,
            (Synced, Invalidating) => true,
            (Invalidating, Skipped { stage: Stage::Invalidate, .. }) => true,
            (Invalidating | Skipped { stage: Stage::Invalidate, .. }, Done { .. }) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::Done { .. } | PublishState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PublishState::Idle => "idle",
            PublishState::Building => "building",
            PublishState::Built => "built",
            PublishState::Syncing => "syncing",
            PublishState::Synced => "synced",
            PublishState::Invalidating => "invalidating",
            PublishState::Skipped { .. } => "skipped",
            PublishState::Failed { .. } => "failed",
            PublishState::Done { .. } => "done",
        }
    }
}

/// Current state plus everything before it. Every transition is logged.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: PublishState,
    history: Vec<PublishState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            current: PublishState::Idle,
            history: vec![PublishState::Idle],
        }
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &PublishState {
        &self.current
    }

    pub fn history(&self) -> &[PublishState] {
        &self.history
    }

    pub fn advance(&mut self, next: PublishState) {
        debug_assert!(
            self.current.allows(&next),
            "invalid transition {:?} -> {:?}",
            self.current,
            next
        );
        match &next {
            PublishState::Skipped { stage, reason } => {
                tracing::info!(state = next.name(), ?stage, "{reason}")
            }
            PublishState::Failed { error } => tracing::error!(state = next.name(), "{error}"),
            PublishState::Done {
                warning: Some(warning),
            } => tracing::warn!(state = next.name(), "finished with warning: {warning}"),
            _ => tracing::info!(state = next.name(), "publish state"),
        }
        self.history.push(next.clone());
        self.current = next;
    }

    /// Record `err` as the terminal failure and hand it back.
    pub fn fail<E: std::fmt::Display>(&mut self, err: E) -> E {
        self.advance(PublishState::Failed {
            error: err.to_string(),
        });
        err
    }

    pub fn into_history(self) -> Vec<PublishState> {
        self.history
    }
}
