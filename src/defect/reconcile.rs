//! Applying tracker answers to stored problems.

use std::collections::HashSet;

use jiff::Timestamp;

use crate::model::{Defect, DefectExistence, Problem, ProblemStatus, ProjectId};
use crate::services::ProblemStore;
use crate::storage::StorageError;

use super::{DefectAdapter, FetchError};

/// A reconciliation pass failed; nothing after the failure was applied.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Reconciles the problems of a store against a tracker.
pub struct Reconciler<'a> {
    pub problems: &'a dyn ProblemStore,
}

impl Reconciler<'_> {
    /// Re-fetch every linked defect of the project and apply the answers.
    pub fn full_index(
        &self,
        project_id: ProjectId,
        adapter: &dyn DefectAdapter,
    ) -> Result<usize, SyncError> {
        let mut problems = self.problems.find_all_with_defect_id(project_id)?;
        let ids = distinct_defect_ids(&problems);
        if ids.is_empty() {
            tracing::debug!(project_id, "no linked defect to index");
            return Ok(0);
        }
        let defects = adapter.get_statuses(project_id, &ids)?;
        let updated = self.update_defect_assignations(&mut problems, &defects)?;
        tracing::info!(project_id, defects = ids.len(), updated, "full defect index");
        Ok(updated)
    }

    /// Apply defects changed since `since`, then retry problems still `Unknown`.
    pub fn incremental_index(
        &self,
        project_id: ProjectId,
        adapter: &dyn DefectAdapter,
        since: Timestamp,
    ) -> Result<usize, SyncError> {
        let mut problems = self.problems.find_all_with_defect_id(project_id)?;

        let changed = adapter.get_changed_defects(project_id, since)?;
        let mut to_save = Vec::new();
        for defect in &changed {
            for problem in problems
                .iter_mut()
                .filter(|p| p.defect_id.as_deref() == Some(defect.id.as_str()))
            {
                if assign_found(problem, defect) {
                    to_save.push(problem.clone());
                }
            }
        }
        if !to_save.is_empty() {
            self.problems.save_all(&to_save)?;
        }
        let mut updated = to_save.len();

        // Linked while the tracker was unreachable: retried until it answers.
        let mut unknown: Vec<Problem> = problems
            .into_iter()
            .filter(|p| p.defect_existence == Some(DefectExistence::Unknown))
            .collect();
        let ids = distinct_defect_ids(&unknown);
        if !ids.is_empty() {
            let defects = adapter.get_statuses(project_id, &ids)?;
            updated += self.update_defect_assignations(&mut unknown, &defects)?;
        }

        tracing::info!(
            project_id,
            changed = changed.len(),
            retried = ids.len(),
            updated,
            "incremental defect index"
        );
        Ok(updated)
    }

    /// Align each problem with its defect, or mark it nonexistent.
    ///
    /// Only problems that actually changed are written, in one batch.
    /// Returns how many were written.
    pub fn update_defect_assignations(
        &self,
        problems: &mut [Problem],
        defects: &[Defect],
    ) -> Result<usize, StorageError> {
        let mut to_save = Vec::new();
        for problem in problems.iter_mut() {
            let Some(defect_id) = problem.defect_id.as_deref() else {
                continue;
            };
            let changed = match defects.iter().find(|d| d.id == defect_id) {
                Some(defect) => assign_found(problem, defect),
                None => assign(problem, DefectExistence::Nonexistent, ProblemStatus::Open, None),
            };
            if changed {
                to_save.push(problem.clone());
            }
        }
        if !to_save.is_empty() {
            self.problems.save_all(&to_save)?;
        }
        Ok(to_save.len())
    }
}

/// Whether two instants match once sub-second precision is ignored.
///
/// Trackers and databases disagree on milliseconds: anything closer than
/// one second is the same instant. Two absent dates are equal.
pub fn are_equal_down_to_seconds(a: Option<Timestamp>, b: Option<Timestamp>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            let delta = a.as_millisecond().abs_diff(b.as_millisecond());
            delta < 1000
        }
        _ => false,
    }
}

fn assign_found(problem: &mut Problem, defect: &Defect) -> bool {
    let closing = match defect.status {
        ProblemStatus::Closed => defect.closing_date,
        ProblemStatus::Open => None,
    };
    assign(problem, DefectExistence::Exists, defect.status, closing)
}

/// Sets the defect fields, returning whether anything changed.
fn assign(
    problem: &mut Problem,
    existence: DefectExistence,
    status: ProblemStatus,
    closing: Option<Timestamp>,
) -> bool {
    if problem.defect_existence == Some(existence)
        && problem.status == status
        && are_equal_down_to_seconds(problem.closing_date_time, closing)
    {
        return false;
    }
    problem.defect_existence = Some(existence);
    problem.status = status;
    problem.closing_date_time = closing;
    true
}

/// Defect ids in first-seen order, without duplicates.
fn distinct_defect_ids(problems: &[Problem]) -> Vec<String> {
    let mut seen = HashSet::new();
    problems
        .iter()
        .filter_map(|p| p.defect_id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
