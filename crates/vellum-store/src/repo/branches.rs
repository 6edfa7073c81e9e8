//! Draft and Published pointer rows
//!
//! Both branches share one repository; every call names the branch it
//! operates on.

#![allow(clippy::result_large_err)]

use rusqlite::{params, Connection, OptionalExtension, Row};
use vellum_core::model::{Branch, BranchPointer, Entity, EntityId, PackageId, RecordId, VersionId};

use super::entities::{entity_from_row, ENTITY_COLUMNS};
use super::tables;
use crate::errors::{from_rusqlite, Result};

fn pointer_from_row(row: &Row<'_>) -> rusqlite::Result<BranchPointer> {
    Ok(BranchPointer {
        entity_id: row.get(0)?,
        version_id: row.get(1)?,
        log_record_id: row.get(2)?,
    })
}

fn collect_entities(
    conn: &Connection,
    sql: &str,
    package_id: PackageId,
) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let entities = stmt
        .query_map([package_id], entity_from_row)
        .map_err(from_rusqlite)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(from_rusqlite)?;
    Ok(entities)
}

fn flag_clause(column: &str, wanted: Option<bool>) -> String {
    match wanted {
        Some(true) => format!(" AND {} IS NOT NULL", column),
        Some(false) => format!(" AND {} IS NULL", column),
        None => String::new(),
    }
}

pub struct BranchRepo;

impl BranchRepo {
    pub fn get(conn: &Connection, branch: Branch, entity_id: EntityId) -> Result<Option<BranchPointer>> {
        let t = tables(branch);
        conn.query_row(
            &format!(
                "SELECT entity_id, version_id, log_record_id FROM {} WHERE entity_id = ?1",
                t.pointers
            ),
            [entity_id],
            pointer_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Current branch version of the entity; `None` if soft-deleted or absent.
    pub fn version_of(conn: &Connection, branch: Branch, entity_id: EntityId) -> Result<Option<VersionId>> {
        Ok(Self::get(conn, branch, entity_id)?.and_then(|p| p.version_id))
    }

    pub fn upsert(conn: &Connection, branch: Branch, pointer: &BranchPointer) -> Result<()> {
        let t = tables(branch);
        conn.execute(
            &format!(
                "INSERT INTO {} (entity_id, version_id, log_record_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_id) DO UPDATE SET
                    version_id = excluded.version_id,
                    log_record_id = excluded.log_record_id",
                t.pointers
            ),
            params![pointer.entity_id, pointer.version_id, pointer.log_record_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn set_log_record(
        conn: &Connection,
        branch: Branch,
        entity_id: EntityId,
        record_id: Option<RecordId>,
    ) -> Result<()> {
        let t = tables(branch);
        conn.execute(
            &format!("UPDATE {} SET log_record_id = ?2 WHERE entity_id = ?1", t.pointers),
            params![entity_id, record_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// All pointer rows of a package, ordered by entity id.
    pub fn list(conn: &Connection, branch: Branch, package_id: PackageId) -> Result<Vec<BranchPointer>> {
        let t = tables(branch);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT b.entity_id, b.version_id, b.log_record_id
                 FROM {} b JOIN entities e ON e.id = b.entity_id
                 WHERE e.package_id = ?1 ORDER BY b.entity_id",
                t.pointers
            ))
            .map_err(from_rusqlite)?;
        let pointers = stmt
            .query_map([package_id], pointer_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(pointers)
    }

    /// Pointer rows whose current version depends on `entity_id`.
    pub fn dependents(conn: &Connection, branch: Branch, entity_id: EntityId) -> Result<Vec<BranchPointer>> {
        let t = tables(branch);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT b.entity_id, b.version_id, b.log_record_id
                 FROM {} b JOIN version_dependencies d ON d.version_id = b.version_id
                 WHERE d.entity_id = ?1 ORDER BY b.entity_id",
                t.pointers
            ))
            .map_err(from_rusqlite)?;
        let pointers = stmt
            .query_map([entity_id], pointer_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(pointers)
    }

    /// Entities whose draft version differs from their published version.
    ///
    /// Soft-deleted drafts count only when `include_deleted_drafts` is set;
    /// an entity with neither a draft nor a published version never counts.
    pub fn unpublished_changes(
        conn: &Connection,
        package_id: PackageId,
        include_deleted_drafts: bool,
    ) -> Result<Vec<Entity>> {
        let mut sql = format!(
            "SELECT {} FROM entities e
             LEFT JOIN drafts d ON d.entity_id = e.id
             LEFT JOIN published p ON p.entity_id = e.id
             WHERE e.package_id = ?1 AND d.version_id IS NOT p.version_id",
            ENTITY_COLUMNS
        );
        if !include_deleted_drafts {
            sql.push_str(" AND d.version_id IS NOT NULL");
        }
        sql.push_str(" ORDER BY e.id");
        collect_entities(conn, &sql, package_id)
    }

    /// Entities soft-deleted in draft but still published.
    pub fn unpublished_deletes(conn: &Connection, package_id: PackageId) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {} FROM entities e
             LEFT JOIN drafts d ON d.entity_id = e.id
             JOIN published p ON p.entity_id = e.id
             WHERE e.package_id = ?1 AND d.version_id IS NULL AND p.version_id IS NOT NULL
             ORDER BY e.id",
            ENTITY_COLUMNS
        );
        collect_entities(conn, &sql, package_id)
    }

    /// Entities filtered by whether they currently have a draft and/or a
    /// published version. `None` leaves that side unconstrained.
    pub fn filter_entities(
        conn: &Connection,
        package_id: PackageId,
        has_draft: Option<bool>,
        has_published: Option<bool>,
    ) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {} FROM entities e
             LEFT JOIN drafts d ON d.entity_id = e.id
             LEFT JOIN published p ON p.entity_id = e.id
             WHERE e.package_id = ?1{}{} ORDER BY e.id",
            ENTITY_COLUMNS,
            flag_clause("d.version_id", has_draft),
            flag_clause("p.version_id", has_published),
        );
        collect_entities(conn, &sql, package_id)
    }

    /// `(entity, published version)` for every entity whose draft differs
    /// from its published version, excluding entities absent on both sides.
    pub fn drafts_differing_from_published(
        conn: &Connection,
        package_id: PackageId,
    ) -> Result<Vec<(EntityId, Option<VersionId>)>> {
        let mut stmt = conn
            .prepare(
                "SELECT e.id, p.version_id FROM entities e
                 LEFT JOIN drafts d ON d.entity_id = e.id
                 LEFT JOIN published p ON p.entity_id = e.id
                 WHERE e.package_id = ?1 AND d.version_id IS NOT p.version_id
                 ORDER BY e.id",
            )
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([package_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(rows)
    }
}
