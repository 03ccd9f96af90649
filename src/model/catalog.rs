//! Catalog entries a project declares: countries and test types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A country the project deploys to and tests in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// A kind of test suite, e.g. `api` or `firefox-desktop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestType {
    pub code: String,
    pub name: String,

    /// Tool the suite's reports come from.
    pub technology: Technology,
}

/// The tool producing a test type's reports.
///
/// Scenario indexing is done per technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Cucumber,
    Postman,
    Cypress,
    Generic,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cucumber => "cucumber",
            Self::Postman => "postman",
            Self::Cypress => "cypress",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}
