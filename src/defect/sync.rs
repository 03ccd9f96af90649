//! Per-project sync scheduling: full or incremental, and when.
//!
//! Timestamps live in a [`SyncState`] owned by the caller, so the same
//! state can be shared by several schedulers and inspected in tests.
//! They are only advanced after a successful pass: a failed pass is
//! retried with the same strategy next time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use jiff::Timestamp;

use crate::model::{DefectExistence, ProjectId};
use crate::services::ProblemStore;
use crate::storage::StorageError;

use super::{DefectAdapter, Reconciler};

/// Hours between two full indexes, unless configured otherwise.
pub const DEFAULT_FULL_INDEX_HOURS: i64 = 1;

const MILLIS_PER_HOUR: u64 = 60 * 60 * 1000;

/// Last successful passes of one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectSync {
    pub last_full: Option<Timestamp>,
    pub last_incremental: Option<Timestamp>,
}

/// Sync timestamps of every project, with one lock per project.
#[derive(Debug, Default)]
pub struct SyncState {
    projects: Mutex<HashMap<ProjectId, Arc<Mutex<ProjectSync>>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding a project's timestamps. Absent projects start empty.
    pub fn project(&self, project_id: ProjectId) -> Arc<Mutex<ProjectSync>> {
        let mut projects = self
            .projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(projects.entry(project_id).or_default())
    }

    /// A copy of the project's timestamps.
    pub fn snapshot(&self, project_id: ProjectId) -> ProjectSync {
        *self
            .project(project_id)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a sync pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Full { updated: usize },
    Incremental { updated: usize },
    Failed,
}

/// Schedules reconciliation passes for projects.
pub struct DefectSync<'a> {
    pub state: &'a SyncState,
    pub problems: &'a dyn ProblemStore,
    pub full_index_hours: i64,
}

impl<'a> DefectSync<'a> {
    pub fn new(state: &'a SyncState, problems: &'a dyn ProblemStore) -> Self {
        Self {
            state,
            problems,
            full_index_hours: DEFAULT_FULL_INDEX_HOURS,
        }
    }

    /// Whether the next pass for `project_id` at `now` must be full.
    pub fn need_full_indexing(&self, project_id: ProjectId, now: Timestamp) -> bool {
        let sync = self.state.snapshot(project_id);
        self.needs_full(&sync, now)
    }

    fn needs_full(&self, sync: &ProjectSync, now: Timestamp) -> bool {
        match (sync.last_full, sync.last_incremental) {
            (Some(last_full), Some(_)) => diff_hours(now, last_full) >= self.full_index_hours,
            _ => true,
        }
    }

    /// Run one pass for a project now. Never fails: errors are logged.
    pub fn update_statuses(&self, project_id: ProjectId, adapter: &dyn DefectAdapter) -> SyncOutcome {
        self.update_statuses_at(project_id, adapter, Timestamp::now())
    }

    /// Run one pass for a project as if the clock read `now`.
    pub fn update_statuses_at(
        &self,
        project_id: ProjectId,
        adapter: &dyn DefectAdapter,
        now: Timestamp,
    ) -> SyncOutcome {
        let lock = self.state.project(project_id);
        let mut sync = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let reconciler = Reconciler {
            problems: self.problems,
        };

        if self.needs_full(&sync, now) {
            match reconciler.full_index(project_id, adapter) {
                Ok(updated) => {
                    sync.last_full = Some(now);
                    sync.last_incremental = Some(now);
                    SyncOutcome::Full { updated }
                }
                Err(e) => {
                    tracing::error!(
                        project_id,
                        tracker = adapter.name(),
                        error = %e,
                        "full defect index failed; will retry"
                    );
                    SyncOutcome::Failed
                }
            }
        } else {
            let Some(since) = sync.last_incremental else {
                return SyncOutcome::Failed;
            };
            match reconciler.incremental_index(project_id, adapter, since) {
                Ok(updated) => {
                    sync.last_incremental = Some(now);
                    SyncOutcome::Incremental { updated }
                }
                Err(e) => {
                    tracing::error!(
                        project_id,
                        tracker = adapter.name(),
                        error = %e,
                        "incremental defect index failed; will retry"
                    );
                    SyncOutcome::Failed
                }
            }
        }
    }

    /// One pass per project, in order. A failing project does not stop the others.
    pub fn update_all(
        &self,
        projects: &[(ProjectId, &dyn DefectAdapter)],
    ) -> Vec<(ProjectId, SyncOutcome)> {
        projects
            .iter()
            .map(|(project_id, adapter)| (*project_id, self.update_statuses(*project_id, *adapter)))
            .collect()
    }

    /// Mark every linked problem `Unknown` and force the next pass to be full.
    ///
    /// Returns how many problems were reset.
    pub fn refresh_defect_existences(&self, project_id: ProjectId) -> Result<usize, StorageError> {
        let reset: Vec<_> = self
            .problems
            .find_all_with_defect_id(project_id)?
            .into_iter()
            .filter(|p| p.defect_existence != Some(DefectExistence::Unknown))
            .map(|mut p| {
                p.defect_existence = Some(DefectExistence::Unknown);
                p
            })
            .collect();
        self.problems.save_all(&reset)?;

        let lock = self.state.project(project_id);
        lock.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_full = None;

        tracing::info!(project_id, reset = reset.len(), "defect existences reset");
        Ok(reset.len())
    }
}

/// Whole hours between two instants, in either order.
pub fn diff_hours(a: Timestamp, b: Timestamp) -> i64 {
    let millis = a.as_millisecond().abs_diff(b.as_millisecond());
    i64::try_from(millis / MILLIS_PER_HOUR).unwrap_or(i64::MAX)
}
