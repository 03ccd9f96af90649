//! Output formatting for CLI display.

use crate::crawl::CrawlReport;
use crate::defect::SyncOutcome;
use crate::model::{DefectExistence, Problem, ProblemStatus};

/// One line per problem: short id, status, name, and defect link if any.
pub(super) fn format_problem(problem: &Problem) -> String {
    let short_id = &problem.id.to_string()[..8];
    let status = match problem.status {
        ProblemStatus::Open => "open",
        ProblemStatus::Closed => "closed",
    };
    match (&problem.defect_id, problem.defect_existence) {
        (Some(defect_id), existence) => {
            let existence = match existence {
                Some(DefectExistence::Exists) => "",
                Some(DefectExistence::Nonexistent) => ", missing",
                Some(DefectExistence::Unknown) | None => ", unchecked",
            };
            format!("{short_id}  [{status}]  {}  (#{defect_id}{existence})", problem.name)
        }
        (None, _) => format!("{short_id}  [{status}]  {}", problem.name),
    }
}

pub(super) fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Full { updated } => format!("full sync, {updated} problem(s) updated"),
        SyncOutcome::Incremental { updated } => {
            format!("incremental sync, {updated} problem(s) updated")
        }
        SyncOutcome::Failed => "sync failed, will retry".to_string(),
    }
}

pub(super) fn format_crawl_report(report: &CrawlReport) -> String {
    let mut parts = vec![
        format!("{} indexed", report.indexed),
        format!("{} skipped", report.skipped),
    ];
    if report.deleted > 0 {
        parts.push(format!("{} deleted", report.deleted));
    }
    if report.failed > 0 {
        parts.push(format!("{} failed", report.failed));
    }
    parts.join(", ")
}
