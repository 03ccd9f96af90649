//! Local persistence for executions, completion requests and problems.
//!
//! Everything lives in a single `SQLite` database:
//!
//! ```text
//! executions                 # indexed columns + JSON body
//! completion_requests        # job URLs waiting for a forced assembly
//! problems                   # problems and their defect links
//! scenario_index_requests    # folders queued for the scenario indexer, one per technology
//! ```

mod completion;
mod execution;
mod problem;
mod scenario;

use std::{fs, path::PathBuf};

use rusqlite::Connection;

pub use scenario::ScenarioIndexRequest;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS executions (
    id          TEXT PRIMARY KEY,
    project_id  INTEGER NOT NULL,
    branch      TEXT NOT NULL,
    cycle       TEXT NOT NULL,
    job_url     TEXT,
    job_link    TEXT NOT NULL,
    status      TEXT NOT NULL,
    test_date   TEXT,
    body        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS executions_job_url ON executions (project_id, job_url);
CREATE INDEX IF NOT EXISTS executions_job_link ON executions (project_id, job_link);

CREATE TABLE IF NOT EXISTS completion_requests (
    job_url      TEXT PRIMARY KEY,
    requested_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS problems (
    id                TEXT PRIMARY KEY,
    project_id        INTEGER NOT NULL,
    name              TEXT NOT NULL,
    defect_id         TEXT,
    defect_existence  TEXT,
    status            TEXT NOT NULL,
    closing_date_time TEXT
);
CREATE INDEX IF NOT EXISTS problems_defect ON problems (project_id, defect_id);

CREATE TABLE IF NOT EXISTS scenario_index_requests (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    technology  TEXT NOT NULL,
    artifact    TEXT NOT NULL,
    queued_at   TEXT NOT NULL
);
DELETE FROM scenario_index_requests WHERE seq NOT IN (
    SELECT MIN(seq) FROM scenario_index_requests GROUP BY technology, artifact
);
CREATE UNIQUE INDEX IF NOT EXISTS scenario_index_requests_key
    ON scenario_index_requests (technology, artifact);
";

/// Local `SQLite`-backed storage.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (or creates) the database at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "opened storage");
        Ok(Self { conn })
    }

    /// Returns the default database path: `~/.runboard/runboard.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".runboard").join("runboard.sqlite"))
    }
}

/// Parses a stored timestamp column.
fn parse_timestamp(value: &str, column: &str) -> Result<jiff::Timestamp> {
    value
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

/// Parses a stored uuid column.
fn parse_uuid(value: &str, column: &str) -> Result<uuid::Uuid> {
    value
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

/// Serializes a unit enum to its bare serde name (`"DONE"`, not `"\"DONE\""`).
fn enum_to_column<T: serde::Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(StorageError::Corrupt(format!("not a unit variant: {other}"))),
    }
}

/// Reverse of [`enum_to_column`].
fn enum_from_column<T: serde::de::DeserializeOwned>(value: &str, column: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}
