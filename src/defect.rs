//! Defect synchronization: keeping problems in line with an issue tracker.
//!
//! A [`DefectAdapter`] talks to one kind of tracker. The [`Reconciler`]
//! applies what it returns to stored problems, and [`DefectSync`] decides
//! per project whether a pass is full or incremental.

mod github;
mod reconcile;
mod sync;

use jiff::Timestamp;

use crate::model::{Defect, ProjectId};

pub use github::GithubAdapter;
pub use reconcile::{Reconciler, SyncError, are_equal_down_to_seconds};
pub use sync::{
    DEFAULT_FULL_INDEX_HOURS, DefectSync, ProjectSync, SyncOutcome, SyncState, diff_hours,
};

/// A tracker could not be reached or answered garbage.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch defects from {tracker}: {message}")]
pub struct FetchError {
    pub tracker: &'static str,
    pub message: String,
}

impl FetchError {
    pub fn new(tracker: &'static str, message: impl Into<String>) -> Self {
        Self {
            tracker,
            message: message.into(),
        }
    }
}

/// Read access to an external defect tracker.
pub trait DefectAdapter {
    /// Stable identifier, as used in the configuration.
    fn code(&self) -> &'static str;

    /// Human-readable tracker name.
    fn name(&self) -> &'static str;

    /// Current state of the given defects.
    ///
    /// Ids the tracker does not know are left out of the result.
    fn get_statuses(&self, project_id: ProjectId, ids: &[String]) -> Result<Vec<Defect>, FetchError>;

    /// Defects created or modified since `since`.
    fn get_changed_defects(
        &self,
        project_id: ProjectId,
        since: Timestamp,
    ) -> Result<Vec<Defect>, FetchError>;

    /// Whether `id` is well formed for this tracker.
    fn is_valid_id(&self, id: &str) -> bool;

    /// Shown to users who typed an invalid id.
    fn id_format_hint(&self) -> &'static str;
}
