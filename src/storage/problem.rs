//! Problem storage: problems and the defects they are linked to.

use rusqlite::{Row, params};

use crate::model::{Problem, ProjectId};
use crate::services::ProblemStore;

use super::{Result, Storage, enum_from_column, enum_to_column, parse_timestamp, parse_uuid};

const COLUMNS: &str =
    "id, project_id, name, defect_id, defect_existence, status, closing_date_time";

impl Storage {
    /// Inserts or replaces a single problem.
    pub fn save_problem(&self, problem: &Problem) -> Result<()> {
        upsert(&self.conn, problem)
    }

    /// Lists all problems of a project, by name.
    pub fn list_problems(&self, project_id: ProjectId) -> Result<Vec<Problem>> {
        self.query_problems(
            &format!("SELECT {COLUMNS} FROM problems WHERE project_id = ?1 ORDER BY name, id"),
            project_id,
        )
    }

    fn query_problems(&self, sql: &str, project_id: ProjectId) -> Result<Vec<Problem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![project_id], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ProblemRow::into_problem).collect()
    }
}

impl ProblemStore for Storage {
    fn find_all_with_defect_id(&self, project_id: ProjectId) -> Result<Vec<Problem>> {
        self.query_problems(
            &format!(
                "SELECT {COLUMNS} FROM problems
                 WHERE project_id = ?1 AND defect_id IS NOT NULL AND defect_id <> ''
                 ORDER BY name, id"
            ),
            project_id,
        )
    }

    fn save_all(&self, problems: &[Problem]) -> Result<()> {
        if problems.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        for problem in problems {
            upsert(&tx, problem)?;
        }
        tx.commit()?;
        tracing::debug!(count = problems.len(), "saved problems");
        Ok(())
    }
}

fn upsert(conn: &rusqlite::Connection, problem: &Problem) -> Result<()> {
    let existence = problem
        .defect_existence
        .as_ref()
        .map(enum_to_column)
        .transpose()?;
    conn.execute(
        "INSERT INTO problems
             (id, project_id, name, defect_id, defect_existence, status, closing_date_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (id) DO UPDATE SET
             project_id = excluded.project_id,
             name = excluded.name,
             defect_id = excluded.defect_id,
             defect_existence = excluded.defect_existence,
             status = excluded.status,
             closing_date_time = excluded.closing_date_time",
        params![
            problem.id.to_string(),
            problem.project_id,
            &problem.name,
            problem.defect_id.as_deref(),
            existence,
            enum_to_column(&problem.status)?,
            problem.closing_date_time.map(|t| t.to_string()),
        ],
    )?;
    Ok(())
}

/// Raw column values, decoded outside of rusqlite's row callback.
struct ProblemRow {
    id: String,
    project_id: ProjectId,
    name: String,
    defect_id: Option<String>,
    defect_existence: Option<String>,
    status: String,
    closing_date_time: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ProblemRow> {
    Ok(ProblemRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        defect_id: row.get(3)?,
        defect_existence: row.get(4)?,
        status: row.get(5)?,
        closing_date_time: row.get(6)?,
    })
}

impl ProblemRow {
    fn into_problem(self) -> Result<Problem> {
        Ok(Problem {
            id: parse_uuid(&self.id, "problem id")?,
            project_id: self.project_id,
            name: self.name,
            defect_id: self.defect_id,
            defect_existence: self
                .defect_existence
                .map(|e| enum_from_column(&e, "defect_existence"))
                .transpose()?,
            status: enum_from_column(&self.status, "status")?,
            closing_date_time: self
                .closing_date_time
                .map(|t| parse_timestamp(&t, "closing_date_time"))
                .transpose()?,
        })
    }
}
