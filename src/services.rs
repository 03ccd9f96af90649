//! Collaborators the pipeline consumes but does not own.
//!
//! `Storage` implements the persistence-backed traits and `Config`
//! implements [`Catalog`]. Quality computation is always external.

use std::path::Path;

use crate::model::{
    CompletionRequest, Country, Execution, Problem, ProjectId, Technology, TestType,
};
use crate::storage::Result;

/// Countries and test types a project declares.
pub trait Catalog {
    fn countries(&self, project_id: ProjectId) -> Vec<Country>;
    fn test_types(&self, project_id: ProjectId) -> Vec<TestType>;
}

/// Pending requests to index a job regardless of its completeness.
pub trait CompletionRequests {
    fn find_completion_request(&self, job_url: &str) -> Result<Option<CompletionRequest>>;
    fn delete_completion_request(&self, request: &CompletionRequest) -> Result<()>;
}

/// Executions indexed by earlier assemblies.
pub trait ExecutionLookup {
    /// The execution of `project_id` whose job URL is `job_url` or whose
    /// job link is `job_link`.
    fn find_by_job_url_or_link(
        &self,
        project_id: ProjectId,
        job_url: Option<&str>,
        job_link: &str,
    ) -> Result<Option<Execution>>;
}

/// Computes `quality_status` and `quality_severities` in place.
pub trait QualityComputer {
    fn compute_quality(&self, execution: &mut Execution);
}

/// Extracts executed scenarios from the reports of one technology.
pub trait ScenarioIndexer {
    fn index_scenarios(&self, technology: Technology, artifact: &Path) -> Result<()>;
}

/// Problems, as seen by the defect reconciler.
pub trait ProblemStore {
    /// Problems of the project with a non-empty defect id.
    fn find_all_with_defect_id(&self, project_id: ProjectId) -> Result<Vec<Problem>>;

    /// Persists all problems in one batch.
    fn save_all(&self, problems: &[Problem]) -> Result<()>;
}

/// Leaves quality for a later, external computation.
///
/// The execution keeps its `Incomplete` status.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredQuality;

impl QualityComputer for DeferredQuality {
    fn compute_quality(&self, execution: &mut Execution) {
        tracing::debug!(execution = %execution.id, "quality computation deferred");
    }
}
