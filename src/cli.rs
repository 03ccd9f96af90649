//! CLI interface for Runboard.
//!
//! Each subcommand is non-interactive: arguments in, JSON on stdout,
//! human-readable progress on stderr.
//!
//! - `runboard index|crawl|complete`: indexing executions.
//! - `runboard problem add|list`: problems and their defect links.
//! - `runboard defects sync|refresh`: keeping problems in line with trackers.
//! - `runboard scenarios`: the queue read by the scenario indexer.

mod format;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::assemble::completion_request;
use crate::config::{Config, ProjectConfig};
use crate::crawl::{CrawlReport, Crawler};
use crate::defect::{DefectAdapter, DefectSync, SyncState};
use crate::model::{Problem, ProjectId};
use crate::services::DeferredQuality;
use crate::storage::Storage;

use format::{format_crawl_report, format_problem, format_sync_outcome};

/// Runboard: index test executions and track their problems.
#[derive(Debug, Parser)]
#[command(name = "runboard", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Configuration file. Defaults to `~/.runboard/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow:
  1. runboard crawl
     → indexes every execution folder of every configured cycle
  2. runboard complete https://ci.example.com/job/nightly/56/
     → the next crawl indexes that job even if it never finished
  3. runboard problem add --project demo "Login fails" --defect 42
  4. runboard defects sync --watch 300
  5. runboard scenarios --drain
     → hands the queued report folders to the scenario indexer

Logging goes to stderr, filtered with RUNBOARD_LOG (e.g. RUNBOARD_LOG=debug)."#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assemble and store a single execution folder.
    ///
    /// Prints the execution JSON, or nothing when the folder has nothing to index yet.
    Index {
        /// Project code or id.
        #[arg(long)]
        project: String,

        #[arg(long)]
        branch: String,

        /// Cycle name.
        #[arg(long)]
        cycle: String,

        /// The execution folder.
        folder: PathBuf,
    },

    /// Index every execution folder of one project, or of all projects.
    Crawl {
        /// Project code or id. All projects when omitted.
        #[arg(long)]
        project: Option<String>,
    },

    /// Request that a job be indexed at its next crawl, complete or not.
    Complete {
        /// The CI job URL, as written in its build-information file.
        job_url: String,
    },

    /// Manage problems.
    Problem {
        #[command(subcommand)]
        command: ProblemCommand,
    },

    /// Synchronize problems with defect trackers.
    Defects {
        #[command(subcommand)]
        command: DefectsCommand,
    },

    /// Print the folders queued for scenario indexing, as JSON.
    Scenarios {
        /// Remove the printed requests from the queue.
        #[arg(long)]
        drain: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProblemCommand {
    /// Create a problem, optionally linked to a defect. Prints the problem JSON.
    Add {
        #[arg(long)]
        project: String,

        /// What goes wrong.
        name: String,

        /// Defect id in the project's tracker.
        #[arg(long)]
        defect: Option<String>,
    },

    /// List a project's problems as JSON.
    List {
        #[arg(long)]
        project: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum DefectsCommand {
    /// Run a sync pass for every project with a tracker.
    Sync {
        /// Project code or id. All projects when omitted.
        #[arg(long)]
        project: Option<String>,

        /// Keep syncing, waiting this many seconds between passes.
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Mark every linked problem as unknown and force a full sync next time.
    Refresh {
        #[arg(long)]
        project: String,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli, config: &Config) -> Result<(), String> {
    let storage = Storage::open(config.database_path()?)
        .map_err(|e| format!("failed to open storage: {e}"))?;

    match cli.command {
        Command::Index {
            project,
            branch,
            cycle,
            folder,
        } => cmd_index(config, &storage, &project, &branch, &cycle, &folder),
        Command::Crawl { project } => cmd_crawl(config, &storage, project.as_deref()),
        Command::Complete { job_url } => cmd_complete(&storage, &job_url),
        Command::Problem { command } => match command {
            ProblemCommand::Add {
                project,
                name,
                defect,
            } => cmd_problem_add(config, &storage, &project, &name, defect.as_deref()),
            ProblemCommand::List { project } => cmd_problem_list(config, &storage, &project),
        },
        Command::Defects { command } => match command {
            DefectsCommand::Sync { project, watch } => {
                cmd_defects_sync(config, &storage, project.as_deref(), watch)
            }
            DefectsCommand::Refresh { project } => cmd_defects_refresh(config, &storage, &project),
        },
        Command::Scenarios { drain } => cmd_scenarios(&storage, drain),
    }
}

fn cmd_index(
    config: &Config,
    storage: &Storage,
    project: &str,
    branch: &str,
    cycle: &str,
    folder: &Path,
) -> Result<(), String> {
    let project = config.project(project)?;
    let cycle = project
        .cycle(branch, cycle)
        .ok_or_else(|| format!("no cycle {branch}/{cycle} in project {}", project.code))?;
    if !folder.is_dir() {
        return Err(format!("not a directory: {}", folder.display()));
    }

    let crawler = Crawler {
        config,
        storage,
        quality: &DeferredQuality,
    };
    let execution = crawler
        .index_folder(project, folder, &cycle)
        .map_err(|e| format!("failed to index {}: {e}", folder.display()))?;

    match execution {
        Some(execution) => {
            eprintln!(
                "Indexed {} [{:?}] with {} run(s)",
                folder.display(),
                execution.status,
                execution.runs.len()
            );
            print_json(&execution)
        }
        None => {
            eprintln!("Nothing to index in {}", folder.display());
            Ok(())
        }
    }
}

fn cmd_crawl(config: &Config, storage: &Storage, project: Option<&str>) -> Result<(), String> {
    let projects = select_projects(config, project)?;
    let crawler = Crawler {
        config,
        storage,
        quality: &DeferredQuality,
    };

    let mut reports = Vec::new();
    for project in projects {
        let report = crawler.crawl_project(project);
        eprintln!("{}: {}", project.code, format_crawl_report(&report));
        reports.push(ProjectReport {
            project: project.code.clone(),
            report,
        });
    }
    print_json(&reports)
}

#[derive(Serialize)]
struct ProjectReport {
    project: String,
    #[serde(flatten)]
    report: CrawlReport,
}

fn cmd_complete(storage: &Storage, job_url: &str) -> Result<(), String> {
    let job_url = job_url.trim();
    if job_url.is_empty() {
        return Err("job URL is empty".to_string());
    }
    storage
        .save_completion_request(&completion_request(job_url))
        .map_err(|e| format!("failed to save completion request: {e}"))?;
    eprintln!("{job_url} will be indexed at the next crawl");
    Ok(())
}

fn cmd_problem_add(
    config: &Config,
    storage: &Storage,
    project: &str,
    name: &str,
    defect: Option<&str>,
) -> Result<(), String> {
    let project = config.project(project)?;
    let name = name.trim();
    if name.is_empty() {
        return Err("problem name is empty".to_string());
    }

    let problem = Problem::new(project.id, name, defect);
    if let Some(defect_id) = &problem.defect_id {
        let adapter = project
            .defect_adapter()
            .ok_or_else(|| format!("project {} has no defect tracker", project.code))?;
        if !adapter.is_valid_id(defect_id) {
            return Err(format!(
                "invalid {} defect id {defect_id:?}: {}",
                adapter.name(),
                adapter.id_format_hint()
            ));
        }
    }

    storage
        .save_problem(&problem)
        .map_err(|e| format!("failed to save problem: {e}"))?;
    eprintln!("Added {}", format_problem(&problem));
    print_json(&problem)
}

fn cmd_problem_list(config: &Config, storage: &Storage, project: &str) -> Result<(), String> {
    let project = config.project(project)?;
    let problems = storage
        .list_problems(project.id)
        .map_err(|e| format!("failed to list problems: {e}"))?;
    for problem in &problems {
        eprintln!("{}", format_problem(problem));
    }
    print_json(&problems)
}

fn cmd_defects_sync(
    config: &Config,
    storage: &Storage,
    project: Option<&str>,
    watch: Option<u64>,
) -> Result<(), String> {
    let adapters: Vec<(ProjectId, String, Box<dyn DefectAdapter>)> =
        select_projects(config, project)?
            .into_iter()
            .filter_map(|p| p.defect_adapter().map(|a| (p.id, p.code.clone(), a)))
            .collect();
    if adapters.is_empty() {
        return Err("no project has a defect tracker configured".to_string());
    }
    let projects: Vec<(ProjectId, &dyn DefectAdapter)> = adapters
        .iter()
        .map(|(id, _, adapter)| (*id, adapter.as_ref()))
        .collect();

    let state = SyncState::new();
    let mut sync = DefectSync::new(&state, storage);
    sync.full_index_hours = config.full_index_hours;

    loop {
        for ((_, outcome), (_, code, _)) in sync.update_all(&projects).iter().zip(&adapters) {
            eprintln!("{code}: {}", format_sync_outcome(outcome));
        }
        let Some(secs) = watch else {
            return Ok(());
        };
        thread::sleep(Duration::from_secs(secs));
    }
}

fn cmd_defects_refresh(config: &Config, storage: &Storage, project: &str) -> Result<(), String> {
    let project = config.project(project)?;
    let state = SyncState::new();
    let sync = DefectSync::new(&state, storage);
    let reset = sync
        .refresh_defect_existences(project.id)
        .map_err(|e| format!("failed to refresh defect existences: {e}"))?;
    eprintln!(
        "{}: {reset} problem(s) marked unknown; run `runboard defects sync` to re-check them",
        project.code
    );
    Ok(())
}

fn cmd_scenarios(storage: &Storage, drain: bool) -> Result<(), String> {
    let requests = if drain {
        storage.drain_scenario_index_requests()
    } else {
        storage.list_scenario_index_requests()
    }
    .map_err(|e| format!("failed to read scenario queue: {e}"))?;
    eprintln!("{} folder(s) queued for scenario indexing", requests.len());
    print_json(&requests)
}

/// One project by code or id, or all of them.
fn select_projects<'a>(
    config: &'a Config,
    project: Option<&str>,
) -> Result<Vec<&'a ProjectConfig>, String> {
    match project {
        Some(key) => Ok(vec![config.project(key)?]),
        None => Ok(config.projects.iter().collect()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}
