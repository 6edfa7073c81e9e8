//! Entities, their immutable versions, and version dependencies

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{Entity, EntityId, EntityVersion, NewVersion, PackageId, VersionId};

use super::rows::{time_at, u32_at, uuid_at};
use crate::db::to_millis;
use crate::errors::{from_rusqlite, is_unique_violation, Result};

/// SELECT list for [`entity_from_row`], with `entities` aliased as `e`.
pub(crate) const ENTITY_COLUMNS: &str =
    "e.id, e.uuid, e.package_id, e.key, e.created_at, e.created_by, e.can_stand_alone";
pub(crate) const VERSION_COLUMNS: &str =
    "v.id, v.uuid, v.entity_id, v.version_num, v.title, v.created_at, v.created_by";

pub(crate) fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        uuid: uuid_at(row, 1)?,
        package_id: row.get(2)?,
        key: row.get(3)?,
        created: time_at(row, 4)?,
        created_by: row.get(5)?,
        can_stand_alone: row.get(6)?,
    })
}

pub(crate) fn version_from_row(row: &Row<'_>) -> rusqlite::Result<EntityVersion> {
    Ok(EntityVersion {
        id: row.get(0)?,
        uuid: uuid_at(row, 1)?,
        entity_id: row.get(2)?,
        version_num: u32_at(row, 3)?,
        title: row.get(4)?,
        created: time_at(row, 5)?,
        created_by: row.get(6)?,
    })
}

pub struct EntityRepo;

impl EntityRepo {
    pub fn insert(
        conn: &Connection,
        package_id: PackageId,
        key: &str,
        created: DateTime<Utc>,
        created_by: Option<&str>,
        can_stand_alone: bool,
    ) -> Result<Entity> {
        let uuid = Uuid::now_v7();
        conn.execute(
            "INSERT INTO entities (uuid, package_id, key, created_at, created_by, can_stand_alone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid.to_string(),
                package_id,
                key,
                to_millis(created),
                created_by,
                can_stand_alone
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ExError::from(VellumError::EntityAlreadyExists {
                    package_id,
                    key: key.to_string(),
                })
                .with_op("insert_entity")
            } else {
                from_rusqlite(e)
            }
        })?;

        Ok(Entity {
            id: conn.last_insert_rowid(),
            uuid,
            package_id,
            key: key.to_string(),
            created,
            created_by: created_by.map(str::to_string),
            can_stand_alone,
        })
    }

    pub fn get(conn: &Connection, id: EntityId) -> Result<Option<Entity>> {
        conn.query_row(
            &format!("SELECT {} FROM entities e WHERE e.id = ?1", ENTITY_COLUMNS),
            [id],
            entity_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn get_by_uuid(conn: &Connection, uuid: &Uuid) -> Result<Option<Entity>> {
        conn.query_row(
            &format!("SELECT {} FROM entities e WHERE e.uuid = ?1", ENTITY_COLUMNS),
            [uuid.to_string()],
            entity_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn get_by_key(conn: &Connection, package_id: PackageId, key: &str) -> Result<Option<Entity>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM entities e WHERE e.package_id = ?1 AND e.key = ?2",
                ENTITY_COLUMNS
            ),
            params![package_id, key],
            entity_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn list(conn: &Connection, package_id: PackageId) -> Result<Vec<Entity>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM entities e WHERE e.package_id = ?1 ORDER BY e.id",
                ENTITY_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let entities = stmt
            .query_map([package_id], entity_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(entities)
    }

    /// Insert a version row. A concurrent writer that already took
    /// `version_num` surfaces as `VersionConflict`, not a raw constraint error.
    pub fn insert_version(
        conn: &Connection,
        entity_id: EntityId,
        new: &NewVersion,
    ) -> Result<EntityVersion> {
        let uuid = Uuid::now_v7();
        conn.execute(
            "INSERT INTO entity_versions (uuid, entity_id, version_num, title, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid.to_string(),
                entity_id,
                new.version_num,
                new.title,
                to_millis(new.created),
                new.created_by
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                let expected = Self::latest_version_num(conn, entity_id)
                    .map(|n| n + 1)
                    .unwrap_or(new.version_num);
                ExError::from(VellumError::VersionConflict {
                    entity_id,
                    expected,
                    requested: new.version_num,
                })
                .with_op("insert_version")
            } else {
                from_rusqlite(e)
            }
        })?;

        Ok(EntityVersion {
            id: conn.last_insert_rowid(),
            uuid,
            entity_id,
            version_num: new.version_num,
            title: new.title.clone(),
            created: new.created,
            created_by: new.created_by.clone(),
        })
    }

    pub fn get_version(conn: &Connection, id: VersionId) -> Result<Option<EntityVersion>> {
        conn.query_row(
            &format!("SELECT {} FROM entity_versions v WHERE v.id = ?1", VERSION_COLUMNS),
            [id],
            version_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn get_version_by_uuid(conn: &Connection, uuid: &Uuid) -> Result<Option<EntityVersion>> {
        conn.query_row(
            &format!("SELECT {} FROM entity_versions v WHERE v.uuid = ?1", VERSION_COLUMNS),
            [uuid.to_string()],
            version_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn latest_version(conn: &Connection, entity_id: EntityId) -> Result<Option<EntityVersion>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM entity_versions v WHERE v.entity_id = ?1
                 ORDER BY v.version_num DESC LIMIT 1",
                VERSION_COLUMNS
            ),
            [entity_id],
            version_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Highest version number of the entity; 0 when it has none.
    pub fn latest_version_num(conn: &Connection, entity_id: EntityId) -> Result<u32> {
        let latest: Option<u32> = conn
            .query_row(
                "SELECT MAX(version_num) FROM entity_versions WHERE entity_id = ?1",
                [entity_id],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(latest.unwrap_or(0))
    }

    pub fn list_versions(conn: &Connection, entity_id: EntityId) -> Result<Vec<EntityVersion>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM entity_versions v WHERE v.entity_id = ?1 ORDER BY v.version_num",
                VERSION_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let versions = stmt
            .query_map([entity_id], version_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(versions)
    }

    /// Record that `version_id` depends on each of `dependencies`. Duplicates
    /// are ignored.
    pub fn insert_dependencies(
        conn: &Connection,
        version_id: VersionId,
        dependencies: &[EntityId],
    ) -> Result<()> {
        let mut stmt = conn
            .prepare(
                "INSERT OR IGNORE INTO version_dependencies (version_id, entity_id) VALUES (?1, ?2)",
            )
            .map_err(from_rusqlite)?;
        for entity_id in dependencies {
            stmt.execute(params![version_id, entity_id])
                .map_err(from_rusqlite)?;
        }
        Ok(())
    }

    pub fn dependencies(conn: &Connection, version_id: VersionId) -> Result<Vec<EntityId>> {
        let mut stmt = conn
            .prepare(
                "SELECT entity_id FROM version_dependencies WHERE version_id = ?1 ORDER BY entity_id",
            )
            .map_err(from_rusqlite)?;
        let ids = stmt
            .query_map([version_id], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<EntityId>>>()
            .map_err(from_rusqlite)?;
        Ok(ids)
    }
}
