//! Cycle definitions and the platform rules that expand them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ProjectId;

/// Country specifier matching every country known to the project.
pub const ALL_COUNTRIES: &str = "all";

/// Separator between type codes in [`PlatformRule::test_types`].
pub const TEST_TYPES_SEPARATOR: char = ',';

/// A branch/cycle pair whose executions are indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDefinition {
    pub project_id: ProjectId,
    pub branch: String,
    pub name: String,

    /// Display ordering among the project's cycles.
    pub weight: i32,
}

/// The rules shipped with an execution, read from its cycle-definition file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CycleRules {
    pub blocking_validation: bool,

    /// Opaque to the pipeline: stored as-is on the execution.
    pub quality_thresholds: serde_json::Value,

    /// Platform name to its rules, in file order per platform.
    pub platforms_rules: BTreeMap<String, Vec<PlatformRule>>,
}

/// Which (country, type) slots a platform is expected to fill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformRule {
    pub enabled: bool,

    /// A country code, or [`ALL_COUNTRIES`].
    pub country: String,

    /// Comma-separated type codes, e.g. `"api,firefox-desktop"`.
    pub test_types: String,

    pub country_tags: String,
    pub severity_tags: String,

    /// Whether the runs of this rule count towards quality thresholds.
    pub blocking_validation: bool,
}

impl PlatformRule {
    /// Type codes in declaration order; blank entries are dropped.
    pub fn type_codes(&self) -> impl Iterator<Item = &str> {
        self.test_types
            .split(TEST_TYPES_SEPARATOR)
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn targets_all_countries(&self) -> bool {
        self.country.trim().eq_ignore_ascii_case(ALL_COUNTRIES)
    }
}
