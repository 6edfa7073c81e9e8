//! SQL-backed [`RecordGraph`] for one branch

#![allow(clippy::result_large_err)]

use rusqlite::{Connection, OptionalExtension};
use vellum_core::errors::ExError;
use vellum_core::hashing::{LiveDependency, RecordGraph};
use vellum_core::model::{Branch, RecordId, VersionId};

use super::tables;
use crate::errors::{from_rusqlite, missing_row};

/// Reads log records and their live dependencies straight from SQLite.
pub struct SqlRecordGraph<'c> {
    conn: &'c Connection,
    branch: Branch,
}

impl<'c> SqlRecordGraph<'c> {
    pub fn new(conn: &'c Connection, branch: Branch) -> Self {
        Self { conn, branch }
    }
}

impl RecordGraph for SqlRecordGraph<'_> {
    fn new_version(&self, record: RecordId) -> Result<Option<VersionId>, ExError> {
        let t = tables(self.branch);
        let row: Option<Option<VersionId>> = self
            .conn
            .query_row(
                &format!("SELECT new_version_id FROM {} WHERE id = ?1", t.records),
                [record],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        row.ok_or_else(|| missing_row("hash_new_version", "log record", record))
    }

    fn live_dependencies(&self, record: RecordId) -> Result<Vec<LiveDependency>, ExError> {
        let t = tables(self.branch);
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "SELECT d.entity_id, b.version_id, b.log_record_id
                 FROM {records} r
                 JOIN version_dependencies d ON d.version_id = r.new_version_id
                 JOIN {pointers} b ON b.entity_id = d.entity_id
                 WHERE r.id = ?1 AND b.version_id IS NOT NULL
                 ORDER BY d.entity_id",
                records = t.records,
                pointers = t.pointers
            ))
            .map_err(from_rusqlite)?;
        let deps = stmt
            .query_map([record], |row| {
                Ok(LiveDependency {
                    entity_id: row.get(0)?,
                    version_id: row.get(1)?,
                    record_id: row.get(2)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(deps)
    }

    fn stored_digest(&self, record: RecordId) -> Result<String, ExError> {
        let t = tables(self.branch);
        let digest: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT dependencies_hash_digest FROM {} WHERE id = ?1",
                    t.records
                ),
                [record],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        digest.ok_or_else(|| missing_row("hash_stored_digest", "log record", record))
    }
}
