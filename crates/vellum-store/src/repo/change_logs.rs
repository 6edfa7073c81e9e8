//! Draft change logs, publish logs, their records and side effects

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;
use vellum_core::model::{
    Branch, DraftChangeLog, EntityId, LogId, LogRecord, PackageId, PublishLog, RecordId,
    SideEffect, VersionId,
};

use super::rows::{time_at, uuid_at};
use super::tables;
use crate::db::to_millis;
use crate::errors::{from_rusqlite, Result};

const RECORD_COLUMNS: &str =
    "id, log_id, entity_id, old_version_id, new_version_id, dependencies_hash_digest";
const DRAFT_LOG_COLUMNS: &str = "id, uuid, package_id, changed_at, changed_by";
const PUBLISH_LOG_COLUMNS: &str = "id, uuid, package_id, message, published_at, published_by";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    Ok(LogRecord {
        id: row.get(0)?,
        log_id: row.get(1)?,
        entity_id: row.get(2)?,
        old_version_id: row.get(3)?,
        new_version_id: row.get(4)?,
        dependencies_hash_digest: row.get(5)?,
    })
}

fn draft_log_from_row(row: &Row<'_>) -> rusqlite::Result<DraftChangeLog> {
    Ok(DraftChangeLog {
        id: row.get(0)?,
        uuid: uuid_at(row, 1)?,
        package_id: row.get(2)?,
        changed_at: time_at(row, 3)?,
        changed_by: row.get(4)?,
    })
}

fn publish_log_from_row(row: &Row<'_>) -> rusqlite::Result<PublishLog> {
    Ok(PublishLog {
        id: row.get(0)?,
        uuid: uuid_at(row, 1)?,
        package_id: row.get(2)?,
        message: row.get(3)?,
        published_at: time_at(row, 4)?,
        published_by: row.get(5)?,
    })
}

fn query_records<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<LogRecord>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let records = stmt
        .query_map(params, record_from_row)
        .map_err(from_rusqlite)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(from_rusqlite)?;
    Ok(records)
}

pub struct LogRepo;

impl LogRepo {
    pub fn create_draft_log(
        conn: &Connection,
        package_id: PackageId,
        changed_at: DateTime<Utc>,
        changed_by: Option<&str>,
    ) -> Result<DraftChangeLog> {
        let uuid = Uuid::now_v7();
        conn.execute(
            "INSERT INTO draft_change_logs (uuid, package_id, changed_at, changed_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![uuid.to_string(), package_id, to_millis(changed_at), changed_by],
        )
        .map_err(from_rusqlite)?;
        Ok(DraftChangeLog {
            id: conn.last_insert_rowid(),
            uuid,
            package_id,
            changed_at,
            changed_by: changed_by.map(str::to_string),
        })
    }

    pub fn create_publish_log(
        conn: &Connection,
        package_id: PackageId,
        message: &str,
        published_at: DateTime<Utc>,
        published_by: Option<&str>,
    ) -> Result<PublishLog> {
        let uuid = Uuid::now_v7();
        conn.execute(
            "INSERT INTO publish_logs (uuid, package_id, message, published_at, published_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![uuid.to_string(), package_id, message, to_millis(published_at), published_by],
        )
        .map_err(from_rusqlite)?;
        Ok(PublishLog {
            id: conn.last_insert_rowid(),
            uuid,
            package_id,
            message: message.to_string(),
            published_at,
            published_by: published_by.map(str::to_string),
        })
    }

    pub fn get_draft_log(conn: &Connection, id: LogId) -> Result<Option<DraftChangeLog>> {
        conn.query_row(
            &format!("SELECT {} FROM draft_change_logs WHERE id = ?1", DRAFT_LOG_COLUMNS),
            [id],
            draft_log_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn get_publish_log(conn: &Connection, id: LogId) -> Result<Option<PublishLog>> {
        conn.query_row(
            &format!("SELECT {} FROM publish_logs WHERE id = ?1", PUBLISH_LOG_COLUMNS),
            [id],
            publish_log_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn list_draft_logs(conn: &Connection, package_id: PackageId) -> Result<Vec<DraftChangeLog>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM draft_change_logs WHERE package_id = ?1 ORDER BY id",
                DRAFT_LOG_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let logs = stmt
            .query_map([package_id], draft_log_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(logs)
    }

    /// Publish logs of a package, oldest first.
    pub fn list_publish_logs(conn: &Connection, package_id: PackageId) -> Result<Vec<PublishLog>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM publish_logs WHERE package_id = ?1 ORDER BY id",
                PUBLISH_LOG_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let logs = stmt
            .query_map([package_id], publish_log_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(logs)
    }

    pub fn last_publish_log(conn: &Connection, package_id: PackageId) -> Result<Option<PublishLog>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM publish_logs WHERE package_id = ?1 ORDER BY id DESC LIMIT 1",
                PUBLISH_LOG_COLUMNS
            ),
            [package_id],
            publish_log_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Delete a log; its records and side effects cascade.
    pub fn delete_log(conn: &Connection, branch: Branch, log_id: LogId) -> Result<()> {
        let t = tables(branch);
        conn.execute(&format!("DELETE FROM {} WHERE id = ?1", t.logs), [log_id])
            .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn insert_record(
        conn: &Connection,
        branch: Branch,
        log_id: LogId,
        entity_id: EntityId,
        old_version_id: Option<VersionId>,
        new_version_id: Option<VersionId>,
    ) -> Result<LogRecord> {
        let t = tables(branch);
        conn.execute(
            &format!(
                "INSERT INTO {} (log_id, entity_id, old_version_id, new_version_id)
                 VALUES (?1, ?2, ?3, ?4)",
                t.records
            ),
            params![log_id, entity_id, old_version_id, new_version_id],
        )
        .map_err(from_rusqlite)?;
        Ok(LogRecord {
            id: conn.last_insert_rowid(),
            log_id,
            entity_id,
            old_version_id,
            new_version_id,
            dependencies_hash_digest: String::new(),
        })
    }

    pub fn get_record(conn: &Connection, branch: Branch, record_id: RecordId) -> Result<Option<LogRecord>> {
        let t = tables(branch);
        conn.query_row(
            &format!("SELECT {} FROM {} WHERE id = ?1", RECORD_COLUMNS, t.records),
            [record_id],
            record_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn find_record(
        conn: &Connection,
        branch: Branch,
        log_id: LogId,
        entity_id: EntityId,
    ) -> Result<Option<LogRecord>> {
        let t = tables(branch);
        conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE log_id = ?1 AND entity_id = ?2",
                RECORD_COLUMNS, t.records
            ),
            params![log_id, entity_id],
            record_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Most recently created record for the entity across all logs.
    pub fn latest_record_for_entity(
        conn: &Connection,
        branch: Branch,
        entity_id: EntityId,
    ) -> Result<Option<LogRecord>> {
        let t = tables(branch);
        conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE entity_id = ?1 ORDER BY id DESC LIMIT 1",
                RECORD_COLUMNS, t.records
            ),
            [entity_id],
            record_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn records_for_log(conn: &Connection, branch: Branch, log_id: LogId) -> Result<Vec<LogRecord>> {
        let t = tables(branch);
        query_records(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE log_id = ?1 ORDER BY id",
                RECORD_COLUMNS, t.records
            ),
            [log_id],
        )
    }

    /// Records currently referenced by a pointer row of the package.
    pub fn current_records(conn: &Connection, branch: Branch, package_id: PackageId) -> Result<Vec<LogRecord>> {
        let t = tables(branch);
        query_records(
            conn,
            &format!(
                "SELECT r.id, r.log_id, r.entity_id, r.old_version_id, r.new_version_id,
                        r.dependencies_hash_digest
                 FROM {} r
                 JOIN {} b ON b.log_record_id = r.id
                 JOIN entities e ON e.id = b.entity_id
                 WHERE e.package_id = ?1 ORDER BY r.id",
                t.records, t.pointers
            ),
            [package_id],
        )
    }

    pub fn count_records(conn: &Connection, branch: Branch, log_id: LogId) -> Result<i64> {
        let t = tables(branch);
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE log_id = ?1", t.records),
            [log_id],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)
    }

    pub fn update_new_version(
        conn: &Connection,
        branch: Branch,
        record_id: RecordId,
        new_version_id: Option<VersionId>,
    ) -> Result<()> {
        let t = tables(branch);
        conn.execute(
            &format!("UPDATE {} SET new_version_id = ?2 WHERE id = ?1", t.records),
            params![record_id, new_version_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn delete_record(conn: &Connection, branch: Branch, record_id: RecordId) -> Result<()> {
        let t = tables(branch);
        conn.execute(&format!("DELETE FROM {} WHERE id = ?1", t.records), [record_id])
            .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn set_digest(conn: &Connection, branch: Branch, record_id: RecordId, digest: &str) -> Result<()> {
        let t = tables(branch);
        conn.execute(
            &format!(
                "UPDATE {} SET dependencies_hash_digest = ?2 WHERE id = ?1",
                t.records
            ),
            params![record_id, digest],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Record a side effect; an existing (cause, effect) pair is kept.
    pub fn insert_side_effect(conn: &Connection, branch: Branch, effect: SideEffect) -> Result<()> {
        let t = tables(branch);
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (cause_id, effect_id) VALUES (?1, ?2)",
                t.side_effects
            ),
            params![effect.cause_id, effect.effect_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Side effects whose cause is a record of the log, in insertion order.
    pub fn side_effects_for_log(conn: &Connection, branch: Branch, log_id: LogId) -> Result<Vec<SideEffect>> {
        let t = tables(branch);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT s.cause_id, s.effect_id FROM {} s
                 JOIN {} r ON r.id = s.cause_id
                 WHERE r.log_id = ?1 ORDER BY s.id",
                t.side_effects, t.records
            ))
            .map_err(from_rusqlite)?;
        let effects = stmt
            .query_map([log_id], |row| {
                Ok(SideEffect {
                    cause_id: row.get(0)?,
                    effect_id: row.get(1)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(effects)
    }

    /// Latest publish record for the entity in a log no newer than `log_id`.
    pub fn published_record_as_of(
        conn: &Connection,
        entity_id: EntityId,
        log_id: LogId,
    ) -> Result<Option<LogRecord>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM publish_log_records
                 WHERE entity_id = ?1 AND log_id <= ?2
                 ORDER BY log_id DESC LIMIT 1",
                RECORD_COLUMNS
            ),
            params![entity_id, log_id],
            record_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }
}
