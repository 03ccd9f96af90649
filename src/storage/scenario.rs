//! Scenario index queue.
//!
//! Scenario extraction is done by an external indexer; assembly only
//! queues which reports to read, per technology. A folder is queued at most
//! once per technology: assembling it again only refreshes `queued_at`.
//! The indexer reads the queue with `runboard scenarios --drain`.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use rusqlite::params;
use serde::Serialize;

use crate::model::Technology;
use crate::services::ScenarioIndexer;

use super::{Result, Storage, enum_from_column, enum_to_column, parse_timestamp};

/// A queued request to extract scenarios from an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioIndexRequest {
    pub technology: Technology,
    pub artifact: PathBuf,
    pub queued_at: Timestamp,
}

impl Storage {
    /// Pending requests, oldest first.
    pub fn list_scenario_index_requests(&self) -> Result<Vec<ScenarioIndexRequest>> {
        let mut stmt = self.conn.prepare(
            "SELECT technology, artifact, queued_at FROM scenario_index_requests ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(technology, artifact, queued_at)| {
                Ok(ScenarioIndexRequest {
                    technology: enum_from_column(&technology, "technology")?,
                    artifact: PathBuf::from(artifact),
                    queued_at: parse_timestamp(&queued_at, "queued_at")?,
                })
            })
            .collect()
    }

    /// Pending requests, oldest first, removed from the queue.
    pub fn drain_scenario_index_requests(&self) -> Result<Vec<ScenarioIndexRequest>> {
        let tx = self.conn.unchecked_transaction()?;
        let requests = self.list_scenario_index_requests()?;
        tx.execute("DELETE FROM scenario_index_requests", [])?;
        tx.commit()?;
        Ok(requests)
    }
}

impl ScenarioIndexer for Storage {
    fn index_scenarios(&self, technology: Technology, artifact: &Path) -> Result<()> {
        self.conn.execute(
            "INSERT INTO scenario_index_requests (technology, artifact, queued_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (technology, artifact) DO UPDATE SET queued_at = excluded.queued_at",
            params![
                enum_to_column(&technology)?,
                artifact.display().to_string(),
                Timestamp::now().to_string(),
            ],
        )?;
        tracing::debug!(%technology, artifact = %artifact.display(), "queued scenario indexing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::tests::test_storage;

    #[test]
    fn requests_are_queued_in_order() {
        let (_dir, storage) = test_storage();

        storage
            .index_scenarios(Technology::Postman, Path::new("/data/1"))
            .unwrap();
        storage
            .index_scenarios(Technology::Cucumber, Path::new("/data/1"))
            .unwrap();

        let queued = storage.list_scenario_index_requests().unwrap();
        let kinds: Vec<Technology> = queued.iter().map(|r| r.technology).collect();
        assert_eq!(kinds, [Technology::Postman, Technology::Cucumber]);
        assert!(queued.iter().all(|r| r.artifact == Path::new("/data/1")));
    }

    #[test]
    fn same_folder_is_queued_once_per_technology() {
        let (_dir, storage) = test_storage();

        for _ in 0..3 {
            storage
                .index_scenarios(Technology::Postman, Path::new("/data/1"))
                .unwrap();
        }
        storage
            .index_scenarios(Technology::Postman, Path::new("/data/2"))
            .unwrap();

        let queued = storage.list_scenario_index_requests().unwrap();
        let artifacts: Vec<&Path> = queued.iter().map(|r| r.artifact.as_path()).collect();
        assert_eq!(artifacts, [Path::new("/data/1"), Path::new("/data/2")]);
    }

    #[test]
    fn drain_empties_the_queue() {
        let (_dir, storage) = test_storage();
        storage
            .index_scenarios(Technology::Cypress, Path::new("/data/1"))
            .unwrap();

        let drained = storage.drain_scenario_index_requests().unwrap();

        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].technology, Technology::Cypress);
        assert!(storage.list_scenario_index_requests().unwrap().is_empty());
    }

    #[test]
    fn empty_queue() {
        let (_dir, storage) = test_storage();
        assert!(storage.list_scenario_index_requests().unwrap().is_empty());
    }
}
