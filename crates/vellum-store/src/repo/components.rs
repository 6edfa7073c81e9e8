//! Components, component types and per-version content maps

#![allow(clippy::result_large_err)]

use rusqlite::{params, Connection, OptionalExtension, Row};
use vellum_core::model::{Component, ComponentType, ContentEntry, EntityId, PackageId, VersionId};

use super::entities::{entity_from_row, ENTITY_COLUMNS};
use crate::errors::{from_rusqlite, Result};

/// Entity columns occupy 0..=6.
fn component_from_row(row: &Row<'_>) -> rusqlite::Result<Component> {
    Ok(Component {
        entity: entity_from_row(row)?,
        component_type: ComponentType::new(row.get::<_, String>(7)?, row.get::<_, String>(8)?),
        local_key: row.get(9)?,
    })
}

fn component_select() -> String {
    format!(
        "SELECT {}, t.namespace, t.name, c.local_key FROM components c
         JOIN entities e ON e.id = c.entity_id
         JOIN component_types t ON t.id = c.component_type_id",
        ENTITY_COLUMNS
    )
}

pub struct ComponentRepo;

impl ComponentRepo {
    /// Id of the `(namespace, name)` type row, inserting it on first use.
    pub fn get_or_create_type(conn: &Connection, component_type: &ComponentType) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO component_types (namespace, name) VALUES (?1, ?2)",
            params![component_type.namespace, component_type.name],
        )
        .map_err(from_rusqlite)?;
        conn.query_row(
            "SELECT id FROM component_types WHERE namespace = ?1 AND name = ?2",
            params![component_type.namespace, component_type.name],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)
    }

    pub fn insert(
        conn: &Connection,
        entity_id: EntityId,
        package_id: PackageId,
        type_id: i64,
        local_key: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO components (entity_id, package_id, component_type_id, local_key)
             VALUES (?1, ?2, ?3, ?4)",
            params![entity_id, package_id, type_id, local_key],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn get(conn: &Connection, entity_id: EntityId) -> Result<Option<Component>> {
        conn.query_row(
            &format!("{} WHERE c.entity_id = ?1", component_select()),
            [entity_id],
            component_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn get_by_key(
        conn: &Connection,
        package_id: PackageId,
        component_type: &ComponentType,
        local_key: &str,
    ) -> Result<Option<Component>> {
        conn.query_row(
            &format!(
                "{} WHERE c.package_id = ?1 AND t.namespace = ?2 AND t.name = ?3 AND c.local_key = ?4",
                component_select()
            ),
            params![package_id, component_type.namespace, component_type.name, local_key],
            component_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn is_component(conn: &Connection, entity_id: EntityId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM components WHERE entity_id = ?1",
                [entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        Ok(found.is_some())
    }

    pub fn list(conn: &Connection, package_id: PackageId) -> Result<Vec<Component>> {
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE c.package_id = ?1 ORDER BY e.id",
                component_select()
            ))
            .map_err(from_rusqlite)?;
        let components = stmt
            .query_map([package_id], component_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(components)
    }

    pub fn insert_version(conn: &Connection, version_id: VersionId, component_id: EntityId) -> Result<()> {
        conn.execute(
            "INSERT INTO component_versions (version_id, component_id) VALUES (?1, ?2)",
            params![version_id, component_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn insert_contents(conn: &Connection, version_id: VersionId, entries: &[ContentEntry]) -> Result<()> {
        let mut stmt = conn
            .prepare(
                "INSERT INTO component_version_contents
                    (version_id, key, content_digest, learner_downloadable)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(from_rusqlite)?;
        for entry in entries {
            stmt.execute(params![
                version_id,
                entry.key,
                entry.content_digest,
                entry.learner_downloadable
            ])
            .map_err(from_rusqlite)?;
        }
        Ok(())
    }

    /// Content map of a component version, ordered by key.
    pub fn contents(conn: &Connection, version_id: VersionId) -> Result<Vec<ContentEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT key, content_digest, learner_downloadable
                 FROM component_version_contents WHERE version_id = ?1 ORDER BY key",
            )
            .map_err(from_rusqlite)?;
        let entries = stmt
            .query_map([version_id], |row| {
                Ok(ContentEntry {
                    key: row.get(0)?,
                    content_digest: row.get(1)?,
                    learner_downloadable: row.get(2)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(entries)
    }
}
