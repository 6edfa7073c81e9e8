//! Containers, their kind extension rows, and container versions

#![allow(clippy::result_large_err)]

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use vellum_core::model::{
    Branch, Container, ContainerKind, ContainerVersion, EntityId, EntityListId, PackageId,
    VersionId,
};

use super::entities::{entity_from_row, version_from_row, ENTITY_COLUMNS, VERSION_COLUMNS};
use super::tables;
use crate::errors::{from_rusqlite, Result};

fn kind_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ContainerKind> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Entity columns occupy 0..=6, the kind sits at 7.
fn container_from_row(row: &Row<'_>) -> rusqlite::Result<Container> {
    Ok(Container {
        entity: entity_from_row(row)?,
        kind: kind_at(row, 7)?,
    })
}

fn container_select() -> String {
    format!(
        "SELECT {}, k.kind FROM containers c
         JOIN entities e ON e.id = c.entity_id
         JOIN container_kinds k ON k.container_id = c.entity_id",
        ENTITY_COLUMNS
    )
}

pub struct ContainerRepo;

impl ContainerRepo {
    /// Insert the generic container row and its kind row.
    pub fn insert(conn: &Connection, entity_id: EntityId, kind: ContainerKind) -> Result<()> {
        conn.execute("INSERT INTO containers (entity_id) VALUES (?1)", [entity_id])
            .map_err(from_rusqlite)?;
        conn.execute(
            "INSERT INTO container_kinds (container_id, kind) VALUES (?1, ?2)",
            params![entity_id, kind.as_str()],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn get(conn: &Connection, entity_id: EntityId) -> Result<Option<Container>> {
        conn.query_row(
            &format!("{} WHERE c.entity_id = ?1", container_select()),
            [entity_id],
            container_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn kind(conn: &Connection, entity_id: EntityId) -> Result<Option<ContainerKind>> {
        conn.query_row(
            "SELECT kind FROM container_kinds WHERE container_id = ?1",
            [entity_id],
            |row| kind_at(row, 0),
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn insert_version(
        conn: &Connection,
        version_id: VersionId,
        container_id: EntityId,
        entity_list_id: EntityListId,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO container_versions (version_id, container_id, entity_list_id)
             VALUES (?1, ?2, ?3)",
            params![version_id, container_id, entity_list_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn get_version(conn: &Connection, version_id: VersionId) -> Result<Option<ContainerVersion>> {
        conn.query_row(
            &format!(
                "SELECT {}, cv.entity_list_id FROM container_versions cv
                 JOIN entity_versions v ON v.id = cv.version_id
                 WHERE cv.version_id = ?1",
                VERSION_COLUMNS
            ),
            [version_id],
            |row| {
                Ok(ContainerVersion {
                    version: version_from_row(row)?,
                    entity_list_id: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Containers of a package, optionally of one kind. Containers whose
    /// draft is soft-deleted are left out unless `include_deleted`.
    pub fn list(
        conn: &Connection,
        package_id: PackageId,
        kind: Option<ContainerKind>,
        include_deleted: bool,
    ) -> Result<Vec<Container>> {
        let mut sql = format!(
            "{} LEFT JOIN drafts d ON d.entity_id = c.entity_id
             WHERE e.package_id = ?1 AND (?2 IS NULL OR k.kind = ?2)",
            container_select()
        );
        if !include_deleted {
            sql.push_str(" AND d.version_id IS NOT NULL");
        }
        sql.push_str(" ORDER BY e.id");

        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let containers = stmt
            .query_map(params![package_id, kind.map(|k| k.as_str())], container_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(containers)
    }

    /// Containers whose current version on `branch` lists `entity_id`,
    /// ordered by container id. With `ignore_pinned`, only unpinned rows
    /// count.
    pub fn containers_with_entity(
        conn: &Connection,
        branch: Branch,
        entity_id: EntityId,
        ignore_pinned: bool,
    ) -> Result<Vec<Container>> {
        let t = tables(branch);
        let mut sql = format!(
            "{} JOIN {} b ON b.entity_id = c.entity_id
             JOIN container_versions cv ON cv.version_id = b.version_id
             WHERE EXISTS (
                SELECT 1 FROM entity_list_rows r
                WHERE r.entity_list_id = cv.entity_list_id AND r.entity_id = ?1",
            container_select(),
            t.pointers
        );
        if ignore_pinned {
            sql.push_str(" AND r.entity_version_id IS NULL");
        }
        sql.push_str(") ORDER BY c.entity_id");

        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let containers = stmt
            .query_map([entity_id], container_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(containers)
    }
}
