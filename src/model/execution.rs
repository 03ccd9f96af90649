//! Execution: one cycle run, with its runs and country deployments.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BuildResult, CycleDefinition, ProjectId, Technology};

/// Where a job stands, as far as indexing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Finished with an outcome: nothing more to index.
    Done,

    Running,

    /// No usable data: not built, not found on disk, or forced to completion.
    Unavailable,
}

impl JobStatus {
    /// `Done` for complete builds, `Unavailable` otherwise.
    pub fn from_completion(complete: bool) -> Self {
        if complete { Self::Done } else { Self::Unavailable }
    }
}

/// Whether users accepted an execution as representative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Acceptance {
    #[default]
    New,
    Accepted,
    Discarded,
}

/// Verdict of the quality computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Passed,
    Warning,
    Failed,

    /// Not computed, or computed on partial data.
    #[default]
    Incomplete,
}

/// One full test run for a branch/cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub branch: String,

    /// Cycle name.
    pub name: String,

    pub release: Option<String>,
    pub version: Option<String>,
    pub build_date_time: Option<Timestamp>,
    pub test_date_time: Option<Timestamp>,
    pub job_url: Option<String>,
    pub job_link: String,
    pub status: JobStatus,
    pub result: Option<BuildResult>,
    pub acceptance: Acceptance,
    pub discard_reason: Option<String>,
    pub cycle_definition: CycleDefinition,
    pub blocking_validation: bool,

    /// Serialized thresholds snapshot, as shipped in the cycle-definition file.
    pub quality_thresholds: Option<String>,

    pub quality_status: QualityStatus,
    pub quality_severities: Option<String>,
    pub duration: i64,
    pub estimated_duration: i64,
    pub runs: Vec<Run>,
    pub country_deployments: Vec<CountryDeployment>,
}

/// One test type executed in one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub country: String,
    pub test_type: String,
    pub technology: Technology,
    pub comment: Option<String>,
    pub platform: String,
    pub job_url: Option<String>,

    /// Folder the run was read from. `None` for placeholders.
    pub job_link: Option<String>,

    pub status: JobStatus,
    pub country_tags: String,
    pub severity_tags: String,
    pub start_date_time: Option<Timestamp>,
    pub duration: Option<i64>,
    pub estimated_duration: Option<i64>,
    pub include_in_thresholds: bool,
}

impl Run {
    /// Expected by a rule but absent from disk.
    pub fn is_placeholder(&self) -> bool {
        self.job_link.is_none()
    }
}

/// The deployment of the tested system to one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryDeployment {
    pub country: String,
    pub platform: String,
    pub job_url: Option<String>,

    /// Folder the deployment was read from. `None` for placeholders.
    pub job_link: Option<String>,

    pub status: JobStatus,
    pub result: Option<BuildResult>,
    pub start_date_time: Option<Timestamp>,
    pub duration: Option<i64>,
    pub estimated_duration: Option<i64>,
}

impl CountryDeployment {
    pub fn is_placeholder(&self) -> bool {
        self.job_link.is_none()
    }
}
