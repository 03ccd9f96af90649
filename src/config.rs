//! Runboard configuration.
//!
//! Loaded from `~/.runboard/config.toml` unless another path is given.
//! Declares the projects to index: where their executions land, their
//! countries, test types and cycles, and which tracker holds their defects.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::assemble::MetadataFiles;
use crate::defect::{DEFAULT_FULL_INDEX_HOURS, DefectAdapter, GithubAdapter};
use crate::model::{Country, CycleDefinition, ProjectId, TestType};
use crate::services::Catalog;
use crate::storage::Storage;

/// Runboard configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// `SQLite` database path. Defaults to `~/.runboard/runboard.sqlite`.
    pub database: Option<PathBuf>,

    #[serde(default = "default_full_index_hours")]
    pub full_index_hours: i64,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

/// One project and where its data comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    pub id: ProjectId,
    pub code: String,
    pub name: String,

    /// Root of `<branch>/<cycle>/incoming/<execution>/` folders.
    pub executions_path: PathBuf,

    #[serde(default = "default_build_information_file")]
    pub build_information_file: String,

    #[serde(default = "default_cycle_definition_file")]
    pub cycle_definition_file: String,

    /// Remove execution folders once indexed as done.
    #[serde(default)]
    pub delete_after_indexing: bool,

    #[serde(default)]
    pub countries: Vec<Country>,

    #[serde(default)]
    pub types: Vec<TestType>,

    #[serde(default)]
    pub cycles: Vec<CycleConfig>,

    pub defects: Option<DefectsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    pub branch: String,
    pub name: String,
    #[serde(default)]
    pub weight: i32,
}

/// The tracker a project's problems link to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum DefectsConfig {
    Github {
        owner: String,
        repository: String,

        /// `GH_CONFIG_DIR` to run `gh` with.
        gh_config: Option<PathBuf>,
    },
}

fn default_full_index_hours() -> i64 {
    DEFAULT_FULL_INDEX_HOURS
}

fn default_build_information_file() -> String {
    MetadataFiles::default().build_information
}

fn default_cycle_definition_file() -> String {
    MetadataFiles::default().cycle_definition
}

impl Config {
    /// Load config from `path`, or from `~/.runboard/config.toml`.
    /// Returns an error if the file is missing or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path().ok_or("could not determine home directory")?,
        };

        if !path.exists() {
            return Err(format!(
                "no config file found at {}\n\
                 Create one with at minimum:\n\n\
                 [[projects]]\n\
                 id = 1\n\
                 code = \"demo\"\n\
                 name = \"Demo\"\n\
                 executions-path = \"/path/to/executions\"",
                path.display()
            ));
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

        Self::parse(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// Parse and validate a configuration document.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(contents).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.full_index_hours <= 0 {
            return Err(format!(
                "full-index-hours must be positive, got {}",
                self.full_index_hours
            ));
        }
        let mut ids = HashSet::new();
        let mut codes = HashSet::new();
        for project in &self.projects {
            if project.code.trim().is_empty() {
                return Err(format!("project {} has an empty code", project.id));
            }
            if !ids.insert(project.id) {
                return Err(format!("duplicate project id {}", project.id));
            }
            if !codes.insert(project.code.as_str()) {
                return Err(format!("duplicate project code {:?}", project.code));
            }
        }
        Ok(())
    }

    /// The config file path: `~/.runboard/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".runboard").join("config.toml"))
    }

    /// The database path, configured or default.
    pub fn database_path(&self) -> Result<PathBuf, String> {
        self.database
            .clone()
            .or_else(Storage::default_path)
            .ok_or_else(|| "could not determine home directory".to_string())
    }

    /// Find a project by code, or by id when `key` is numeric.
    pub fn project(&self, key: &str) -> Result<&ProjectConfig, String> {
        self.projects
            .iter()
            .find(|p| p.code == key || key.parse::<ProjectId>().is_ok_and(|id| id == p.id))
            .ok_or_else(|| format!("unknown project: {key}"))
    }

    fn project_by_id(&self, project_id: ProjectId) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.id == project_id)
    }
}

impl ProjectConfig {
    pub fn metadata_files(&self) -> MetadataFiles {
        MetadataFiles {
            build_information: self.build_information_file.clone(),
            cycle_definition: self.cycle_definition_file.clone(),
        }
    }

    pub fn cycle_definitions(&self) -> Vec<CycleDefinition> {
        self.cycles
            .iter()
            .map(|c| CycleDefinition {
                project_id: self.id,
                branch: c.branch.clone(),
                name: c.name.clone(),
                weight: c.weight,
            })
            .collect()
    }

    /// The configured cycle, matched on branch and name.
    pub fn cycle(&self, branch: &str, name: &str) -> Option<CycleDefinition> {
        self.cycle_definitions()
            .into_iter()
            .find(|c| c.branch == branch && c.name == name)
    }

    /// The tracker adapter, if the project links problems to defects.
    pub fn defect_adapter(&self) -> Option<Box<dyn DefectAdapter>> {
        self.defects.as_ref().map(|defects| match defects {
            DefectsConfig::Github {
                owner,
                repository,
                gh_config,
            } => Box::new(GithubAdapter {
                owner: owner.clone(),
                repository: repository.clone(),
                gh_config: gh_config.clone(),
            }) as Box<dyn DefectAdapter>,
        })
    }
}

impl Catalog for Config {
    fn countries(&self, project_id: ProjectId) -> Vec<Country> {
        self.project_by_id(project_id)
            .map(|p| p.countries.clone())
            .unwrap_or_default()
    }

    fn test_types(&self, project_id: ProjectId) -> Vec<TestType> {
        self.project_by_id(project_id)
            .map(|p| p.types.clone())
            .unwrap_or_default()
    }
}
