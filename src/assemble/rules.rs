//! Platform rule resolution: expected slots against what is on disk.
//!
//! Every enabled rule expands into one country deployment per
//! (platform, country) and one run per (country, type). Slots with no
//! readable build on disk become placeholders, so an execution always
//! shows everything its cycle expects.

use std::collections::{BTreeMap, HashMap};

use crate::model::{
    Build, Country, CountryDeployment, JobStatus, PlatformRule, Run, TestType,
};
use crate::scan::ExecutionTree;

/// Runs and country deployments produced for an execution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub runs: Vec<Run>,
    pub country_deployments: Vec<CountryDeployment>,
}

/// Expand platform rules against the catalogs and a folder snapshot.
///
/// Pure: everything on disk is already in `tree`. Platforms are visited in
/// name order and rules in declaration order. When two rules resolve to the
/// same slot, the first real entry wins; a placeholder only holds the slot
/// until real data shows up.
pub fn resolve(
    platforms_rules: &BTreeMap<String, Vec<PlatformRule>>,
    countries: &[Country],
    types: &[TestType],
    tree: &ExecutionTree,
) -> Resolution {
    let mut deployments = Slots::new(CountryDeployment::is_placeholder);
    let mut runs = Slots::new(Run::is_placeholder);

    for (platform, rules) in platforms_rules {
        for rule in rules.iter().filter(|rule| rule.enabled) {
            for country in rule_countries(rule, countries) {
                let folder = tree.country(&country.code);

                let build = folder.and_then(|f| f.build.as_ref());
                deployments.insert(
                    (platform.clone(), country.code.clone()),
                    country_deployment(platform, country, build),
                );

                for code in rule.type_codes() {
                    let Some(test_type) = types.iter().find(|t| t.code.eq_ignore_ascii_case(code))
                    else {
                        tracing::debug!(code, platform, "unknown test type in rule");
                        continue;
                    };
                    let build = folder
                        .and_then(|f| f.test_type(&test_type.code))
                        .and_then(|t| t.build.as_ref());
                    runs.insert(
                        (country.code.clone(), test_type.code.clone()),
                        run(platform, rule, country, test_type, build),
                    );
                }
            }
        }
    }

    Resolution {
        runs: runs.into_items(),
        country_deployments: deployments.into_items(),
    }
}

/// Countries a rule targets: all of them for the wildcard, else an exact match.
fn rule_countries<'a>(rule: &PlatformRule, countries: &'a [Country]) -> Vec<&'a Country> {
    let known = countries.iter().filter(|c| !c.code.trim().is_empty());
    if rule.targets_all_countries() {
        return known.collect();
    }
    let code = rule.country.trim();
    let matched: Vec<&Country> = known
        .filter(|c| c.code.eq_ignore_ascii_case(code))
        .take(1)
        .collect();
    if matched.is_empty() {
        tracing::debug!(country = code, "unknown country in rule");
    }
    matched
}

fn country_deployment(platform: &str, country: &Country, build: Option<&Build>) -> CountryDeployment {
    let mut deployment = CountryDeployment {
        country: country.code.clone(),
        platform: platform.to_string(),
        job_url: None,
        job_link: None,
        status: JobStatus::Unavailable,
        result: None,
        start_date_time: None,
        duration: None,
        estimated_duration: None,
    };
    if let Some(build) = build {
        deployment.job_url = build.job_url().map(str::to_string);
        deployment.job_link = Some(build.link.clone());
        deployment.status = JobStatus::from_completion(build.is_complete());
        deployment.result = build.result;
        deployment.start_date_time = build.started_at();
        deployment.duration = Some(build.duration);
        deployment.estimated_duration = Some(build.estimated_duration);
    }
    deployment
}

fn run(
    platform: &str,
    rule: &PlatformRule,
    country: &Country,
    test_type: &TestType,
    build: Option<&Build>,
) -> Run {
    let mut run = Run {
        country: country.code.clone(),
        test_type: test_type.code.clone(),
        technology: test_type.technology,
        comment: None,
        platform: platform.to_string(),
        job_url: None,
        job_link: None,
        status: JobStatus::Unavailable,
        country_tags: rule.country_tags.clone(),
        severity_tags: rule.severity_tags.clone(),
        start_date_time: None,
        duration: None,
        estimated_duration: None,
        include_in_thresholds: rule.blocking_validation,
    };
    if let Some(build) = build {
        run.comment = build.comment.clone().filter(|c| !c.is_empty());
        run.job_url = build.job_url().map(str::to_string);
        run.job_link = Some(build.link.clone());
        run.status = JobStatus::from_completion(build.is_complete());
        run.start_date_time = build.started_at();
        run.duration = Some(build.duration);
        run.estimated_duration = Some(build.estimated_duration);
    }
    run
}

/// Insertion-ordered entries, unique per key.
struct Slots<T> {
    items: Vec<T>,
    positions: HashMap<(String, String), usize>,
    is_placeholder: fn(&T) -> bool,
}

impl<T> Slots<T> {
    fn new(is_placeholder: fn(&T) -> bool) -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            is_placeholder,
        }
    }

    fn insert(&mut self, key: (String, String), item: T) {
        match self.positions.get(&key) {
            Some(&at) => {
                if (self.is_placeholder)(&self.items[at]) && !(self.is_placeholder)(&item) {
                    self.items[at] = item;
                }
            }
            None => {
                self.positions.insert(key, self.items.len());
                self.items.push(item);
            }
        }
    }

    fn into_items(self) -> Vec<T> {
        self.items
    }
}
