//! Completion requests: job URLs to assemble at their next crawl, complete or not.

use rusqlite::{OptionalExtension, params};

use crate::model::CompletionRequest;
use crate::services::CompletionRequests;

use super::{Result, Storage, parse_timestamp};

impl Storage {
    /// Records a request, replacing any earlier one for the same job.
    pub fn save_completion_request(&self, request: &CompletionRequest) -> Result<()> {
        self.conn.execute(
            "INSERT INTO completion_requests (job_url, requested_at) VALUES (?1, ?2)
             ON CONFLICT (job_url) DO UPDATE SET requested_at = excluded.requested_at",
            params![&request.job_url, request.requested_at.to_string()],
        )?;
        Ok(())
    }
}

impl CompletionRequests for Storage {
    fn find_completion_request(&self, job_url: &str) -> Result<Option<CompletionRequest>> {
        let requested_at: Option<String> = self
            .conn
            .query_row(
                "SELECT requested_at FROM completion_requests WHERE job_url = ?1",
                params![job_url],
                |row| row.get(0),
            )
            .optional()?;
        requested_at
            .map(|at| {
                Ok(CompletionRequest {
                    job_url: job_url.to_string(),
                    requested_at: parse_timestamp(&at, "requested_at")?,
                })
            })
            .transpose()
    }

    fn delete_completion_request(&self, request: &CompletionRequest) -> Result<()> {
        self.conn.execute(
            "DELETE FROM completion_requests WHERE job_url = ?1",
            params![&request.job_url],
        )?;
        Ok(())
    }
}
