//! Build: the raw job record decoded from a metadata file.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Outcome reported by the continuous integration server for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    Aborted,

    /// Queued or skipped: the job never produced an outcome.
    NotBuilt,
}

/// A job as described by its build-information file.
///
/// Only lives while an execution folder is being assembled.
/// Timestamps and durations are Unix milliseconds, as written by the CI server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Build {
    /// Folder the build was read from, with a trailing separator.
    /// Set by the reader; never taken from the file.
    #[serde(skip)]
    pub link: String,

    /// CI job URL, shown to users to reach the job logs.
    pub url: Option<String>,

    /// `None` while the job has not reported an outcome yet.
    pub result: Option<BuildResult>,

    pub building: bool,
    pub duration: i64,
    pub estimated_duration: i64,
    pub timestamp: i64,
    pub release: Option<String>,
    pub version: Option<String>,
    pub version_timestamp: Option<i64>,

    /// Title displayed above the run.
    pub comment: Option<String>,
}

impl Build {
    /// A build is complete when it no longer runs and has an actual outcome.
    pub fn is_complete(&self) -> bool {
        !self.building && self.result.is_some_and(|r| r != BuildResult::NotBuilt)
    }

    /// The job URL, with empty strings treated as absent.
    pub fn job_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// When the job started.
    pub fn started_at(&self) -> Option<Timestamp> {
        Timestamp::from_millisecond(self.timestamp).ok()
    }

    /// When the tested version was produced, if the job reported it.
    pub fn version_built_at(&self) -> Option<Timestamp> {
        self.version_timestamp
            .and_then(|ms| Timestamp::from_millisecond(ms).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_build_information_json() {
        let json = r#"{
            "url": "https://build.company.com/demo/test/56/",
            "result": "UNSTABLE",
            "building": false,
            "duration": 1200,
            "estimatedDuration": 1500,
            "timestamp": 1581908400000,
            "release": "v2",
            "version": "1904.3",
            "versionTimestamp": 1581900000000,
            "comment": "nightly"
        }"#;

        let build: Build = serde_json::from_str(json).unwrap();

        assert_eq!(build.result, Some(BuildResult::Unstable));
        assert_eq!(build.estimated_duration, 1500);
        assert_eq!(build.version_timestamp, Some(1_581_900_000_000));
        assert!(build.link.is_empty());
        assert!(build.is_complete());
        assert_eq!(
            build.started_at().unwrap(),
            Timestamp::from_millisecond(1_581_908_400_000).unwrap()
        );
    }

    #[test]
    fn missing_fields_take_defaults() {
        let build: Build = serde_json::from_str(r#"{"url": "https://ci/1/"}"#).unwrap();

        assert!(!build.building);
        assert_eq!(build.result, None);
        assert_eq!(build.version_built_at(), None);
    }

    #[test]
    fn completeness_requires_outcome_and_no_activity() {
        let mut build = Build {
            result: Some(BuildResult::Failure),
            ..Build::default()
        };
        assert!(build.is_complete());

        build.building = true;
        assert!(!build.is_complete());

        build.building = false;
        build.result = Some(BuildResult::NotBuilt);
        assert!(!build.is_complete());

        build.result = None;
        assert!(!build.is_complete());
    }

    #[test]
    fn empty_url_is_absent() {
        let build = Build {
            url: Some(String::new()),
            ..Build::default()
        };
        assert_eq!(build.job_url(), None);
    }
}
