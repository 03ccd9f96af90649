//! Execution storage: upsert, lookup by job, and listing.
//!
//! The full execution is stored as a JSON body; the columns next to it
//! only exist for lookups.

use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::model::{Execution, ProjectId};
use crate::services::ExecutionLookup;

use super::{Result, Storage, StorageError, enum_to_column, parse_uuid};

impl Storage {
    /// Inserts the execution, or replaces the one with the same id.
    pub fn save_execution(&self, execution: &Execution) -> Result<()> {
        let body = serde_json::to_string(execution)?;
        self.conn.execute(
            "INSERT INTO executions
                 (id, project_id, branch, cycle, job_url, job_link, status, test_date, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (id) DO UPDATE SET
                 project_id = excluded.project_id,
                 branch = excluded.branch,
                 cycle = excluded.cycle,
                 job_url = excluded.job_url,
                 job_link = excluded.job_link,
                 status = excluded.status,
                 test_date = excluded.test_date,
                 body = excluded.body",
            params![
                execution.id.to_string(),
                execution.project_id,
                &execution.branch,
                &execution.name,
                execution.job_url.as_deref(),
                &execution.job_link,
                enum_to_column(&execution.status)?,
                execution.test_date_time.map(|t| t.to_string()),
                body,
            ],
        )?;
        Ok(())
    }

    /// Loads a single execution.
    pub fn load_execution(&self, id: Uuid) -> Result<Option<Execution>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM executions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| decode(&b)).transpose()
    }

    /// Lists a project's executions, most recent test first.
    ///
    /// Executions without a test date come last.
    pub fn list_executions(&self, project_id: ProjectId) -> Result<Vec<Execution>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM executions WHERE project_id = ?1
             ORDER BY test_date IS NULL, test_date DESC, id",
        )?;
        let bodies = stmt
            .query_map(params![project_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        bodies.iter().map(|b| decode(b)).collect()
    }
}

impl ExecutionLookup for Storage {
    fn find_by_job_url_or_link(
        &self,
        project_id: ProjectId,
        job_url: Option<&str>,
        job_link: &str,
    ) -> Result<Option<Execution>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, body FROM executions
                 WHERE project_id = ?1 AND (job_link = ?2 OR (?3 IS NOT NULL AND job_url = ?3))
                 ORDER BY job_link = ?2 DESC
                 LIMIT 1",
                params![project_id, job_link, job_url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((id, body)) = row else {
            return Ok(None);
        };
        let execution = decode(&body)?;
        if execution.id != parse_uuid(&id, "execution id")? {
            return Err(StorageError::Corrupt(format!(
                "execution {id} has a body for {}",
                execution.id
            )));
        }
        Ok(Some(execution))
    }
}

fn decode(body: &str) -> Result<Execution> {
    serde_json::from_str(body)
        .map_err(|e| StorageError::Corrupt(format!("invalid execution body: {e}")))
}
