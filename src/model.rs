//! Core data model for Runboard.
//!
//! These types represent the pipeline's vocabulary:
//! builds read from disk, cycle rules, executions with their runs and
//! country deployments, and problems linked to external defects.

mod build;
mod catalog;
mod cycle;
mod execution;
mod problem;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub use build::{Build, BuildResult};
pub use catalog::{Country, Technology, TestType};
pub use cycle::{ALL_COUNTRIES, CycleDefinition, CycleRules, PlatformRule, TEST_TYPES_SEPARATOR};
pub use execution::{
    Acceptance, CountryDeployment, Execution, JobStatus, QualityStatus, Run,
};
pub use problem::{Defect, DefectExistence, Problem, ProblemStatus};

/// Identifier of a project, as declared in the configuration.
pub type ProjectId = i64;

/// A request to index a job now, even if it is not complete.
///
/// Left by an external trigger; consumed by the next assembly of that job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub job_url: String,
    pub requested_at: Timestamp,
}
