//! GitHub issues as defects, fetched through the `gh` CLI.
//!
//! Issue numbers are the defect ids. Authentication is whatever `gh` is
//! logged in as, optionally isolated with a dedicated `GH_CONFIG_DIR`.

use std::path::PathBuf;
use std::process::Command;

use jiff::Timestamp;
use serde::Deserialize;

use crate::model::{Defect, ProblemStatus, ProjectId};

use super::{DefectAdapter, FetchError};

const CODE: &str = "github";
const NAME: &str = "GitHub";

/// Issues of one GitHub repository.
#[derive(Debug, Clone)]
pub struct GithubAdapter {
    pub owner: String,
    pub repository: String,
    pub gh_config: Option<PathBuf>,
}

/// JSON shape of an issue returned by the REST API.
#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    state: String,
    closed_at: Option<Timestamp>,
}

impl From<GhIssue> for Defect {
    fn from(issue: GhIssue) -> Self {
        let (status, closing_date) = if issue.state == "open" {
            (ProblemStatus::Open, None)
        } else {
            (ProblemStatus::Closed, issue.closed_at)
        };
        Defect {
            id: issue.number.to_string(),
            status,
            closing_date,
        }
    }
}

impl GithubAdapter {
    fn issues_path(&self) -> String {
        format!("repos/{}/{}/issues", self.owner, self.repository)
    }

    /// Run `gh api` and return stdout. A missing resource is `Ok(None)`.
    fn gh_api(&self, args: &[&str]) -> Result<Option<String>, FetchError> {
        let mut cmd = Command::new("gh");
        cmd.arg("api").args(args);
        if let Some(config) = &self.gh_config {
            cmd.env("GH_CONFIG_DIR", config);
        }
        let output = cmd
            .output()
            .map_err(|e| FetchError::new(CODE, format!("failed to run gh: {e}")))?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing(&stderr) {
            return Ok(None);
        }
        Err(FetchError::new(
            CODE,
            format!("gh api {} failed: {}", args.join(" "), stderr.trim()),
        ))
    }
}

impl DefectAdapter for GithubAdapter {
    fn code(&self) -> &'static str {
        CODE
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn get_statuses(&self, project_id: ProjectId, ids: &[String]) -> Result<Vec<Defect>, FetchError> {
        let mut defects = Vec::new();
        for id in ids {
            if !self.is_valid_id(id) {
                tracing::debug!(project_id, id, "not a GitHub issue number");
                continue;
            }
            let path = format!("{}/{}", self.issues_path(), id.trim());
            match self.gh_api(&[path.as_str()])? {
                Some(json) => defects.push(parse_issue(&json)?),
                None => tracing::debug!(project_id, id, "GitHub issue not found"),
            }
        }
        Ok(defects)
    }

    fn get_changed_defects(
        &self,
        project_id: ProjectId,
        since: Timestamp,
    ) -> Result<Vec<Defect>, FetchError> {
        let path = format!(
            "{}?state=all&per_page=100&since={}",
            self.issues_path(),
            since.strftime("%Y-%m-%dT%H:%M:%SZ")
        );
        let Some(json) = self.gh_api(&["--paginate", path.as_str()])? else {
            return Err(FetchError::new(
                CODE,
                format!("repository {}/{} not found", self.owner, self.repository),
            ));
        };
        let defects = parse_issue_pages(&json)?;
        tracing::debug!(project_id, changed = defects.len(), "GitHub issues changed");
        Ok(defects)
    }

    /// Issue numbers as GitHub writes them back: no sign, no leading zero.
    fn is_valid_id(&self, id: &str) -> bool {
        let id = id.trim();
        !id.starts_with('0')
            && id.bytes().all(|b| b.is_ascii_digit())
            && id.parse::<u64>().is_ok_and(|n| n > 0)
    }

    fn id_format_hint(&self) -> &'static str {
        "The ID must be a positive integer, without leading zeros."
    }
}

/// Whether `gh` failed because the resource is not there: unknown (404)
/// or deleted (410).
fn is_missing(stderr: &str) -> bool {
    stderr.contains("HTTP 404") || stderr.contains("HTTP 410")
}

fn parse_issue(json: &str) -> Result<Defect, FetchError> {
    let issue: GhIssue = serde_json::from_str(json)
        .map_err(|e| FetchError::new(CODE, format!("unexpected issue JSON: {e}")))?;
    Ok(issue.into())
}

/// Parse the output of `gh api --paginate`: one JSON array per page, back to back.
fn parse_issue_pages(json: &str) -> Result<Vec<Defect>, FetchError> {
    let mut defects = Vec::new();
    for page in serde_json::Deserializer::from_str(json).into_iter::<Vec<GhIssue>>() {
        let page =
            page.map_err(|e| FetchError::new(CODE, format!("unexpected issues JSON: {e}")))?;
        defects.extend(page.into_iter().map(Defect::from));
    }
    Ok(defects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GithubAdapter {
        GithubAdapter {
            owner: "acme".into(),
            repository: "shop".into(),
            gh_config: None,
        }
    }

    #[test]
    fn open_issue_has_no_closing_date() {
        let defect = parse_issue(
            r#"{"number": 12, "state": "open", "closed_at": null, "title": "Cart is empty"}"#,
        )
        .unwrap();

        assert_eq!(defect.id, "12");
        assert_eq!(defect.status, ProblemStatus::Open);
        assert_eq!(defect.closing_date, None);
    }

    #[test]
    fn closed_issue_keeps_its_closing_date() {
        let defect =
            parse_issue(r#"{"number": 7, "state": "closed", "closed_at": "2020-02-17T03:00:00Z"}"#)
                .unwrap();

        assert_eq!(defect.status, ProblemStatus::Closed);
        assert_eq!(
            defect.closing_date,
            Some("2020-02-17T03:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn paginated_output_is_concatenated_arrays() {
        let json = r#"[{"number": 1, "state": "open", "closed_at": null}]
[{"number": 2, "state": "closed", "closed_at": "2020-02-17T03:00:00Z"}][]"#;

        let defects = parse_issue_pages(json).unwrap();

        let ids: Vec<&str> = defects.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn empty_output_has_no_issues() {
        assert!(parse_issue_pages("").unwrap().is_empty());
    }

    #[test]
    fn malformed_output_is_a_fetch_error() {
        let err = parse_issue_pages(r#"{"message": "Bad credentials"}"#).unwrap_err();
        assert_eq!(err.tracker, "github");
    }

    #[test]
    fn ids_are_positive_integers() {
        let adapter = adapter();
        assert!(adapter.is_valid_id("42"));
        assert!(!adapter.is_valid_id("0"));
        assert!(!adapter.is_valid_id("-3"));
        assert!(!adapter.is_valid_id("PROJ-12"));
        assert!(!adapter.is_valid_id(""));
        assert!(!adapter.is_valid_id("+42"));
    }

    #[test]
    fn leading_zeros_are_rejected() {
        // GitHub answers with `"number": 42`, which would never match "042".
        let adapter = adapter();
        assert!(!adapter.is_valid_id("042"));
        assert!(!adapter.is_valid_id("00"));
        assert!(adapter.is_valid_id("420"));
    }

    #[test]
    fn unknown_and_deleted_issues_are_missing() {
        assert!(is_missing("gh: Not Found (HTTP 404)"));
        assert!(is_missing("gh: This issue was deleted (HTTP 410)"));
        assert!(!is_missing("gh: Bad credentials (HTTP 401)"));
        assert!(!is_missing("error connecting to api.github.com"));
    }

    #[test]
    fn issues_path_targets_the_repository() {
        assert_eq!(adapter().issues_path(), "repos/acme/shop/issues");
    }
}
