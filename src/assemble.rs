//! Execution assembly: turn an execution folder into an `Execution`.
//!
//! Assembly decides first whether there is anything to index at all:
//! a folder without a root build is not an execution yet, a job already
//! indexed as done is left alone, and a running job with no rules is
//! waiting for more data. A completion request overrides both waits.

pub mod rules;

use std::collections::BTreeSet;
use std::path::Path;

use jiff::Timestamp;
use uuid::Uuid;

use crate::model::{
    Acceptance, CompletionRequest, CycleDefinition, Execution, JobStatus, QualityStatus,
};
use crate::scan;
use crate::services::{
    Catalog, CompletionRequests, ExecutionLookup, QualityComputer, ScenarioIndexer,
};
use crate::storage::Result;

pub use rules::{Resolution, resolve};

/// Metadata file names, configured per project.
#[derive(Debug, Clone)]
pub struct MetadataFiles {
    pub build_information: String,
    pub cycle_definition: String,
}

impl Default for MetadataFiles {
    fn default() -> Self {
        Self {
            build_information: "buildInformation.json".into(),
            cycle_definition: "cycleDefinition.json".into(),
        }
    }
}

/// Builds executions from folders, using the given collaborators.
pub struct Assembler<'a> {
    pub files: &'a MetadataFiles,
    pub catalog: &'a dyn Catalog,
    pub completions: &'a dyn CompletionRequests,
    pub executions: &'a dyn ExecutionLookup,
    pub quality: &'a dyn QualityComputer,
    pub scenarios: &'a dyn ScenarioIndexer,
}

impl Assembler<'_> {
    /// Assemble the execution stored in `folder` for `cycle`.
    ///
    /// Returns `None` when there is nothing to index (yet).
    /// Undecodable metadata files are treated as missing.
    pub fn assemble(&self, folder: &Path, cycle: &CycleDefinition) -> Result<Option<Execution>> {
        let project_id = cycle.project_id;

        let Some(build) = scan::read_build(folder, &self.files.build_information) else {
            tracing::debug!(folder = %folder.display(), "no root build: not an execution yet");
            return Ok(None);
        };

        let job_url = build.job_url();
        let previous =
            self.executions
                .find_by_job_url_or_link(project_id, job_url, &build.link)?;
        let complete = build.is_complete();

        let request = match job_url {
            Some(url) => self.completions.find_completion_request(url)?,
            None => None,
        };

        if request.is_none() && previous.as_ref().is_some_and(|e| e.status == JobStatus::Done) {
            tracing::debug!(folder = %folder.display(), "execution already done: skipping");
            return Ok(None);
        }

        let rules = scan::read_cycle_rules(folder, &self.files.cycle_definition);
        if request.is_none() && !complete && rules.is_none() {
            tracing::debug!(folder = %folder.display(), "running job without cycle rules: waiting");
            return Ok(None);
        }

        if let Some(request) = &request {
            tracing::info!(job_url = %request.job_url, "consuming completion request");
            self.completions.delete_completion_request(request)?;
        }

        let mut execution = Execution {
            id: previous.map_or_else(Uuid::new_v4, |e| e.id),
            project_id,
            branch: cycle.branch.clone(),
            name: cycle.name.clone(),
            release: build.release.clone(),
            version: build.version.clone(),
            build_date_time: build.version_built_at(),
            test_date_time: build.started_at(),
            job_url: job_url.map(str::to_string),
            job_link: build.link.clone(),
            status: JobStatus::from_completion(complete),
            result: build.result,
            acceptance: Acceptance::New,
            discard_reason: None,
            cycle_definition: cycle.clone(),
            blocking_validation: false,
            quality_thresholds: None,
            quality_status: QualityStatus::Incomplete,
            quality_severities: None,
            duration: build.duration,
            estimated_duration: build.estimated_duration,
            runs: Vec::new(),
            country_deployments: Vec::new(),
        };

        let Some(rules) = rules else {
            tracing::info!(
                folder = %folder.display(),
                status = ?execution.status,
                "indexing execution without cycle rules"
            );
            return Ok(Some(execution));
        };

        execution.blocking_validation = rules.blocking_validation;
        execution.quality_thresholds = Some(rules.quality_thresholds.to_string());

        let tree = scan::scan_execution(folder, &self.files.build_information);
        let resolution = resolve(
            &rules.platforms_rules,
            &self.catalog.countries(project_id),
            &self.catalog.test_types(project_id),
            &tree,
        );
        execution.runs = resolution.runs;
        execution.country_deployments = resolution.country_deployments;

        if execution.status == JobStatus::Done {
            self.quality.compute_quality(&mut execution);
        }

        let technologies: BTreeSet<_> = execution
            .runs
            .iter()
            .filter(|run| !run.is_placeholder())
            .map(|run| run.technology)
            .collect();
        for technology in technologies {
            self.scenarios.index_scenarios(technology, folder)?;
        }

        tracing::info!(
            folder = %folder.display(),
            status = ?execution.status,
            runs = execution.runs.len(),
            deployments = execution.country_deployments.len(),
            "assembled execution"
        );
        Ok(Some(execution))
    }
}

/// Record an external request to index `job_url` at its next assembly.
pub fn completion_request(job_url: &str) -> CompletionRequest {
    CompletionRequest {
        job_url: job_url.to_string(),
        requested_at: Timestamp::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    use crate::model::Technology;
    use crate::services::fakes::{
        FakeCatalog, FakeCompletions, FakeExecutions, FakeQuality, FakeScenarios,
    };

    struct Fixture {
        files: MetadataFiles,
        catalog: FakeCatalog,
        completions: FakeCompletions,
        executions: FakeExecutions,
        quality: FakeQuality,
        scenarios: FakeScenarios,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                files: MetadataFiles::default(),
                catalog: FakeCatalog::with(
                    &["fr", "us"],
                    &[
                        ("api", Technology::Postman),
                        ("mobile", Technology::Cucumber),
                        ("desktop", Technology::Cucumber),
                    ],
                ),
                completions: FakeCompletions::default(),
                executions: FakeExecutions::default(),
                quality: FakeQuality::default(),
                scenarios: FakeScenarios::default(),
            }
        }

        fn assembler(&self) -> Assembler<'_> {
            Assembler {
                files: &self.files,
                catalog: &self.catalog,
                completions: &self.completions,
                executions: &self.executions,
                quality: &self.quality,
                scenarios: &self.scenarios,
            }
        }

        fn quality_calls(&self) -> usize {
            *self.quality.calls.borrow()
        }
    }

    fn cycle() -> CycleDefinition {
        CycleDefinition {
            project_id: 1,
            branch: "develop".into(),
            name: "day".into(),
            weight: 1,
        }
    }

    fn write_build(dir: &Path, url: &str, result: &str, building: bool) {
        fs::create_dir_all(dir).unwrap();
        let json = format!(
            r#"{{"url": "{url}", "result": "{result}", "building": {building},
                "timestamp": 1581908400000, "duration": 60000, "estimatedDuration": 65000,
                "release": "v2", "version": "1904.3", "versionTimestamp": 1581900000000}}"#
        );
        fs::write(dir.join("buildInformation.json"), json).unwrap();
    }

    fn write_rules(dir: &Path) {
        let json = r#"{
            "blockingValidation": true,
            "qualityThresholds": {"sanity-check": {"failure": 100, "warning": 100}},
            "platformsRules": {
                "integ": [
                    {"enabled": true, "country": "fr", "testTypes": "api,mobile,desktop",
                     "countryTags": "all", "severityTags": "all", "blockingValidation": true}
                ]
            }
        }"#;
        fs::write(dir.join("cycleDefinition.json"), json).unwrap();
    }

    /// Execution folder with fr/api and fr/mobile on disk, fr/desktop missing.
    fn execution_folder() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_build(root, "https://ci/exec/1/", "SUCCESS", false);
        write_rules(root);
        write_build(&root.join("fr"), "https://ci/deploy/fr/", "SUCCESS", false);
        write_build(&root.join("fr").join("api"), "https://ci/fr/api/", "FAILURE", false);
        write_build(&root.join("fr").join("mobile"), "https://ci/fr/mobile/", "SUCCESS", false);
        dir
    }

    fn stored(status: JobStatus, job_url: &str) -> Execution {
        Execution {
            id: Uuid::new_v4(),
            project_id: 1,
            branch: "develop".into(),
            name: "day".into(),
            release: None,
            version: None,
            build_date_time: None,
            test_date_time: None,
            job_url: Some(job_url.into()),
            job_link: "/elsewhere/".into(),
            status,
            result: None,
            acceptance: Acceptance::New,
            discard_reason: None,
            cycle_definition: cycle(),
            blocking_validation: false,
            quality_thresholds: None,
            quality_status: QualityStatus::Incomplete,
            quality_severities: None,
            duration: 0,
            estimated_duration: 0,
            runs: Vec::new(),
            country_deployments: Vec::new(),
        }
    }

    #[test]
    fn folder_without_root_build_is_not_an_execution() {
        let dir = TempDir::new().unwrap();
        write_rules(dir.path());
        let fixture = Fixture::new();

        let execution = fixture.assembler().assemble(dir.path(), &cycle()).unwrap();
        assert!(execution.is_none());
    }

    #[test]
    fn complete_build_without_rules_is_indexed_bare() {
        let dir = TempDir::new().unwrap();
        write_build(dir.path(), "https://ci/exec/1/", "SUCCESS", false);
        fs::create_dir_all(dir.path().join("fr").join("api")).unwrap();
        let fixture = Fixture::new();

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        assert_eq!(execution.status, JobStatus::Done);
        assert!(execution.runs.is_empty());
        assert!(execution.country_deployments.is_empty());
        assert_eq!(execution.quality_thresholds, None);
        assert!(!execution.blocking_validation);
        assert_eq!(execution.quality_status, QualityStatus::Incomplete);
        assert_eq!(fixture.quality_calls(), 0);
        assert!(fixture.scenarios.calls.borrow().is_empty());
    }

    #[test]
    fn execution_fields_come_from_cycle_and_build() {
        let dir = execution_folder();
        let fixture = Fixture::new();

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        assert_eq!(execution.branch, "develop");
        assert_eq!(execution.name, "day");
        assert_eq!(execution.release.as_deref(), Some("v2"));
        assert_eq!(execution.version.as_deref(), Some("1904.3"));
        assert_eq!(execution.job_url.as_deref(), Some("https://ci/exec/1/"));
        assert_eq!(execution.job_link, scan::folder_link(dir.path()));
        assert_eq!(execution.duration, 60_000);
        assert_eq!(execution.estimated_duration, 65_000);
        assert_eq!(
            execution.test_date_time,
            Some(Timestamp::from_millisecond(1_581_908_400_000).unwrap())
        );
        assert_eq!(
            execution.build_date_time,
            Some(Timestamp::from_millisecond(1_581_900_000_000).unwrap())
        );
        assert_eq!(execution.acceptance, Acceptance::New);
        assert!(execution.blocking_validation);
        assert!(
            execution
                .quality_thresholds
                .as_deref()
                .unwrap()
                .contains("sanity-check")
        );
    }

    #[test]
    fn rules_produce_real_and_placeholder_runs() {
        let dir = execution_folder();
        let fixture = Fixture::new();

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        assert_eq!(execution.runs.len(), 3);
        let desktop = execution
            .runs
            .iter()
            .find(|r| r.test_type == "desktop")
            .unwrap();
        assert!(desktop.is_placeholder());
        assert_eq!(desktop.status, JobStatus::Unavailable);
        assert_eq!(desktop.country_tags, "all");

        assert_eq!(execution.country_deployments.len(), 1);
        assert!(!execution.country_deployments[0].is_placeholder());
        assert_eq!(fixture.quality_calls(), 1);
        assert_eq!(execution.quality_status, QualityStatus::Passed);
    }

    #[test]
    fn scenarios_are_indexed_once_per_technology() {
        let dir = execution_folder();
        let fixture = Fixture::new();

        fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        // api is postman, mobile is cucumber; desktop (cucumber) is a placeholder.
        let calls = fixture.scenarios.calls.borrow();
        let technologies: Vec<Technology> = calls.iter().map(|(t, _)| *t).collect();
        assert_eq!(technologies, [Technology::Cucumber, Technology::Postman]);
        assert!(calls.iter().all(|(_, path)| path == dir.path()));
    }

    #[test]
    fn done_execution_is_not_reprocessed() {
        let dir = execution_folder();
        let mut fixture = Fixture::new();
        fixture
            .executions
            .executions
            .push(stored(JobStatus::Done, "https://ci/exec/1/"));

        let execution = fixture.assembler().assemble(dir.path(), &cycle()).unwrap();

        assert!(execution.is_none());
        assert_eq!(fixture.quality_calls(), 0);
    }

    #[test]
    fn unfinished_previous_execution_keeps_its_id() {
        let dir = execution_folder();
        let mut fixture = Fixture::new();
        let previous = stored(JobStatus::Unavailable, "https://ci/exec/1/");
        let previous_id = previous.id;
        fixture.executions.executions.push(previous);

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        assert_eq!(execution.id, previous_id);
        assert_eq!(execution.status, JobStatus::Done);
    }

    #[test]
    fn running_job_without_rules_waits() {
        let dir = TempDir::new().unwrap();
        write_build(dir.path(), "https://ci/exec/2/", "SUCCESS", true);
        let fixture = Fixture::new();

        let execution = fixture.assembler().assemble(dir.path(), &cycle()).unwrap();
        assert!(execution.is_none());
    }

    #[test]
    fn running_job_with_rules_is_indexed_unavailable() {
        let dir = execution_folder();
        write_build(dir.path(), "https://ci/exec/1/", "SUCCESS", true);
        let fixture = Fixture::new();

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        assert_eq!(execution.status, JobStatus::Unavailable);
        assert_eq!(execution.runs.len(), 3);
        assert_eq!(execution.quality_status, QualityStatus::Incomplete);
        assert_eq!(fixture.quality_calls(), 0);
    }

    #[test]
    fn completion_request_forces_indexing_and_is_consumed() {
        let dir = TempDir::new().unwrap();
        write_build(dir.path(), "https://ci/exec/3/", "NOT_BUILT", false);
        let fixture = Fixture::new();
        fixture
            .completions
            .requests
            .borrow_mut()
            .push(completion_request("https://ci/exec/3/"));

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        assert_eq!(execution.status, JobStatus::Unavailable);
        assert!(execution.runs.is_empty());
        assert!(fixture.completions.requests.borrow().is_empty());
    }

    #[test]
    fn completion_request_overrides_done_previous_execution() {
        let dir = execution_folder();
        let mut fixture = Fixture::new();
        fixture
            .executions
            .executions
            .push(stored(JobStatus::Done, "https://ci/exec/1/"));
        fixture
            .completions
            .requests
            .borrow_mut()
            .push(completion_request("https://ci/exec/1/"));

        let execution = fixture.assembler().assemble(dir.path(), &cycle()).unwrap();

        assert!(execution.is_some());
        assert!(fixture.completions.requests.borrow().is_empty());
    }

    #[test]
    fn undecodable_run_build_becomes_placeholder() {
        let dir = execution_folder();
        fs::write(
            dir.path().join("fr").join("api").join("buildInformation.json"),
            "{ truncated",
        )
        .unwrap();
        let fixture = Fixture::new();

        let execution = fixture
            .assembler()
            .assemble(dir.path(), &cycle())
            .unwrap()
            .unwrap();

        let api = execution.runs.iter().find(|r| r.test_type == "api").unwrap();
        assert!(api.is_placeholder());
        assert_eq!(execution.runs.len(), 3);
    }
}
