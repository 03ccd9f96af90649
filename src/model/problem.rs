//! Problems and the external defects they link to.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProjectId;

/// Open or closed, for both problems and defects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemStatus {
    #[default]
    Open,
    Closed,
}

/// What the defect tracker last said about a problem's defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectExistence {
    /// Never checked, or the tracker was unreachable.
    Unknown,
    Exists,
    Nonexistent,
}

/// A known failure pattern, optionally linked to an external defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub name: String,
    pub defect_id: Option<String>,

    /// `None` when no defect is linked.
    pub defect_existence: Option<DefectExistence>,

    pub status: ProblemStatus,
    pub closing_date_time: Option<Timestamp>,
}

impl Problem {
    /// A new open problem. A non-blank defect id starts as `Unknown`.
    pub fn new(project_id: ProjectId, name: impl Into<String>, defect_id: Option<&str>) -> Self {
        let defect_id = defect_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let defect_existence = defect_id.as_ref().map(|_| DefectExistence::Unknown);
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            defect_id,
            defect_existence,
            status: ProblemStatus::Open,
            closing_date_time: None,
        }
    }
}

/// An issue-tracker record, as fetched by a defect adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defect {
    pub id: String,
    pub status: ProblemStatus,

    /// Only set for closed defects.
    pub closing_date: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_problem_starts_unknown() {
        let problem = Problem::new(1, "Login fails", Some(" 42 "));

        assert_eq!(problem.defect_id.as_deref(), Some("42"));
        assert_eq!(problem.defect_existence, Some(DefectExistence::Unknown));
        assert_eq!(problem.status, ProblemStatus::Open);
    }

    #[test]
    fn blank_defect_id_means_unlinked() {
        let problem = Problem::new(1, "Cart is empty", Some("  "));

        assert_eq!(problem.defect_id, None);
        assert_eq!(problem.defect_existence, None);
    }
}
