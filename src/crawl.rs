//! Crawling a project's executions folder.
//!
//! Executions land under:
//!
//! ```text
//! <executions-path>/<branch>/<cycle>/incoming/<execution>/
//! ```
//!
//! Every configured cycle is visited and each execution folder assembled
//! and stored. A failing folder is logged and the crawl moves on.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::assemble::Assembler;
use crate::config::{Config, ProjectConfig};
use crate::model::{CycleDefinition, Execution, JobStatus};
use crate::scan;
use crate::services::QualityComputer;
use crate::storage::{Result, Storage};

/// What a crawl did, folder by folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub indexed: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub struct Crawler<'a> {
    pub config: &'a Config,
    pub storage: &'a Storage,
    pub quality: &'a dyn QualityComputer,
}

impl Crawler<'_> {
    /// Crawl every configured cycle of a project.
    pub fn crawl_project(&self, project: &ProjectConfig) -> CrawlReport {
        let mut report = CrawlReport::default();
        for cycle in project.cycle_definitions() {
            let incoming = project
                .executions_path
                .join(&cycle.branch)
                .join(&cycle.name)
                .join("incoming");
            for (name, folder) in scan::list_subdirectories(&incoming) {
                match self.index_folder(project, &folder, &cycle) {
                    Ok(None) => report.skipped += 1,
                    Ok(Some(execution)) => {
                        report.indexed += 1;
                        if self.remove_if_done(project, &folder, &execution) {
                            report.deleted += 1;
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            project = %project.code,
                            branch = %cycle.branch,
                            cycle = %cycle.name,
                            folder = %name,
                            error = %e,
                            "failed to index execution"
                        );
                        report.failed += 1;
                    }
                }
            }
        }
        tracing::info!(
            project = %project.code,
            indexed = report.indexed,
            skipped = report.skipped,
            deleted = report.deleted,
            failed = report.failed,
            "crawl finished"
        );
        report
    }

    /// Assemble one execution folder and store the result.
    pub fn index_folder(
        &self,
        project: &ProjectConfig,
        folder: &Path,
        cycle: &CycleDefinition,
    ) -> Result<Option<Execution>> {
        let files = project.metadata_files();
        let assembler = Assembler {
            files: &files,
            catalog: self.config,
            completions: self.storage,
            executions: self.storage,
            quality: self.quality,
            scenarios: self.storage,
        };
        let Some(execution) = assembler.assemble(folder, cycle)? else {
            return Ok(None);
        };
        self.storage.save_execution(&execution)?;
        Ok(Some(execution))
    }

    fn remove_if_done(&self, project: &ProjectConfig, folder: &Path, execution: &Execution) -> bool {
        if !project.delete_after_indexing || execution.status != JobStatus::Done {
            return false;
        }
        match fs::remove_dir_all(folder) {
            Ok(()) => {
                tracing::debug!(folder = %folder.display(), "removed indexed execution folder");
                true
            }
            Err(e) => {
                tracing::warn!(folder = %folder.display(), error = %e, "could not remove folder");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::services::DeferredQuality;

    fn config(root: &Path, delete: bool) -> Config {
        Config::parse(&format!(
            r#"
[[projects]]
id = 1
code = "demo"
name = "Demo"
executions-path = "{}"
delete-after-indexing = {delete}
countries = [{{ code = "fr", name = "France" }}]
types = [{{ code = "api", name = "API", technology = "postman" }}]
cycles = [{{ branch = "develop", name = "day", weight = 1 }}]
"#,
            root.display()
        ))
        .unwrap()
    }

    fn execution_folder(root: &Path, name: &str, building: bool) -> PathBuf {
        let folder = root.join("develop").join("day").join("incoming").join(name);
        fs::create_dir_all(&folder).unwrap();
        fs::write(
            folder.join("buildInformation.json"),
            format!(
                r#"{{"url": "https://ci/{name}/", "result": "SUCCESS", "building": {building}}}"#
            ),
        )
        .unwrap();
        folder
    }

    fn storage(dir: &TempDir) -> Storage {
        Storage::open(dir.path().join("runboard.sqlite")).unwrap()
    }

    #[test]
    fn crawl_indexes_each_folder_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("executions");
        execution_folder(&root, "1581908400000", false);
        execution_folder(&root, "1581912000000", false);
        let config = config(&root, false);
        let storage = storage(&dir);
        let crawler = Crawler {
            config: &config,
            storage: &storage,
            quality: &DeferredQuality,
        };

        let first = crawler.crawl_project(&config.projects[0]);
        assert_eq!(first.indexed, 2);
        assert_eq!(storage.list_executions(1).unwrap().len(), 2);

        let second = crawler.crawl_project(&config.projects[0]);
        assert_eq!(second.indexed, 0);
        assert_eq!(second.skipped, 2);
    }

    #[test]
    fn running_execution_is_left_for_later() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("executions");
        execution_folder(&root, "1581908400000", true);
        let config = config(&root, true);
        let storage = storage(&dir);
        let crawler = Crawler {
            config: &config,
            storage: &storage,
            quality: &DeferredQuality,
        };

        let report = crawler.crawl_project(&config.projects[0]);

        assert_eq!(report.skipped, 1);
        assert!(storage.list_executions(1).unwrap().is_empty());
    }

    #[test]
    fn done_folders_are_deleted_when_configured() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("executions");
        let folder = execution_folder(&root, "1581908400000", false);
        let config = config(&root, true);
        let storage = storage(&dir);
        let crawler = Crawler {
            config: &config,
            storage: &storage,
            quality: &DeferredQuality,
        };

        let report = crawler.crawl_project(&config.projects[0]);

        assert_eq!(report.deleted, 1);
        assert!(!folder.exists());
        assert_eq!(storage.list_executions(1).unwrap()[0].status, JobStatus::Done);
    }

    #[test]
    fn recrawling_a_running_execution_queues_its_scenarios_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("executions");
        let folder = execution_folder(&root, "1581908400000", true);
        fs::write(
            folder.join("cycleDefinition.json"),
            r#"{"platformsRules": {"integ": [
                {"enabled": true, "country": "fr", "testTypes": "api"}
            ]}}"#,
        )
        .unwrap();
        let api = folder.join("fr").join("api");
        fs::create_dir_all(&api).unwrap();
        fs::write(
            api.join("buildInformation.json"),
            r#"{"url": "https://ci/fr/api/", "result": "SUCCESS"}"#,
        )
        .unwrap();
        let config = config(&root, false);
        let storage = storage(&dir);
        let crawler = Crawler {
            config: &config,
            storage: &storage,
            quality: &DeferredQuality,
        };

        for _ in 0..3 {
            assert_eq!(crawler.crawl_project(&config.projects[0]).indexed, 1);
        }

        let executions = storage.list_executions(1).unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, JobStatus::Unavailable);
        let queued = storage.list_scenario_index_requests().unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].artifact, folder);
    }

    #[test]
    fn missing_cycle_folder_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir.path().join("nowhere"), false);
        let storage = storage(&dir);
        let crawler = Crawler {
            config: &config,
            storage: &storage,
            quality: &DeferredQuality,
        };

        assert_eq!(
            crawler.crawl_project(&config.projects[0]),
            CrawlReport::default()
        );
    }
}
