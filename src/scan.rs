//! Reading execution folders: metadata files and the folder tree.
//!
//! An execution folder looks like:
//!
//! ```text
//! <execution>/
//!   buildInformation.json      # root build
//!   cycleDefinition.json       # platform rules
//!   fr/                        # one folder per country
//!     buildInformation.json    # country deployment build
//!     api/                     # one folder per test type
//!       buildInformation.json  # run build
//! ```
//!
//! File names are configured per project. Reading never fails: a missing
//! or undecodable file is reported as absent.

use std::{
    fs, io,
    path::{MAIN_SEPARATOR, Path, PathBuf},
};

use serde::de::DeserializeOwned;

use crate::model::{Build, CycleRules};

/// Read the build-information file of a folder.
///
/// The returned build's `link` is the folder path with a trailing separator.
pub fn read_build(folder: &Path, filename: &str) -> Option<Build> {
    let mut build: Build = read_metadata(&folder.join(filename))?;
    build.link = folder_link(folder);
    Some(build)
}

/// Read the cycle-definition file of an execution folder.
pub fn read_cycle_rules(folder: &Path, filename: &str) -> Option<CycleRules> {
    read_metadata(&folder.join(filename))
}

/// The job link recorded for a folder: its path with a trailing separator.
pub fn folder_link(folder: &Path) -> String {
    let path = folder.display().to_string();
    if path.ends_with(MAIN_SEPARATOR) {
        path
    } else {
        format!("{path}{MAIN_SEPARATOR}")
    }
}

fn read_metadata<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "metadata file not found");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable metadata file");
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "undecodable metadata file");
            None
        }
    }
}

/// Snapshot of an execution folder, taken before rule resolution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTree {
    pub countries: Vec<CountryFolder>,
}

/// A direct subfolder of the execution folder.
#[derive(Debug, Clone)]
pub struct CountryFolder {
    pub name: String,
    pub build: Option<Build>,
    pub types: Vec<TypeFolder>,
}

/// A direct subfolder of a country folder.
#[derive(Debug, Clone)]
pub struct TypeFolder {
    pub name: String,
    pub build: Option<Build>,
}

impl ExecutionTree {
    /// The first folder whose name matches `code`, ignoring case.
    pub fn country(&self, code: &str) -> Option<&CountryFolder> {
        self.countries
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(code))
    }
}

impl CountryFolder {
    /// The first type folder whose name matches `code`, ignoring case.
    pub fn test_type(&self, code: &str) -> Option<&TypeFolder> {
        self.types.iter().find(|t| t.name.eq_ignore_ascii_case(code))
    }
}

/// Walk an execution folder two levels deep, reading every build file.
///
/// Files other than directories are ignored. Folders are sorted by name.
pub fn scan_execution(folder: &Path, build_file: &str) -> ExecutionTree {
    let countries = list_subdirectories(folder)
        .into_iter()
        .map(|(name, path)| {
            let types = list_subdirectories(&path)
                .into_iter()
                .map(|(name, path)| TypeFolder {
                    build: read_build(&path, build_file),
                    name,
                })
                .collect();
            CountryFolder {
                build: read_build(&path, build_file),
                name,
                types,
            }
        })
        .collect();

    ExecutionTree { countries }
}

/// List a directory's immediate subdirectories, sorted by name.
///
/// A missing or unreadable directory has no subdirectories.
pub fn list_subdirectories(path: &Path) -> Vec<(String, PathBuf)> {
    let Ok(read_dir) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut dirs: Vec<(String, PathBuf)> = read_dir
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let is_dir = entry.file_type().ok()?.is_dir();
            is_dir.then(|| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        })
        .collect();

    // Sort for deterministic output.
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    dirs
}
