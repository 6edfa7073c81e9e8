//! Package persistence

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;
use vellum_core::model::{Package, PackageId};

use super::rows::{time_at, uuid_at};
use crate::db::to_millis;
use crate::errors::{from_rusqlite, Result};

const COLUMNS: &str = "id, uuid, key, title, description, created_at, updated_at";

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        id: row.get(0)?,
        uuid: uuid_at(row, 1)?,
        key: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        created: time_at(row, 5)?,
        updated: time_at(row, 6)?,
    })
}

/// Field changes for [`PackageRepo::update`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct PackageChanges {
    pub key: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

pub struct PackageRepo;

impl PackageRepo {
    pub fn insert(
        conn: &Connection,
        key: &str,
        title: &str,
        description: &str,
        created: DateTime<Utc>,
    ) -> Result<Package> {
        let uuid = Uuid::now_v7();
        conn.execute(
            "INSERT INTO packages (uuid, key, title, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![uuid.to_string(), key, title, description, to_millis(created)],
        )
        .map_err(from_rusqlite)?;

        Ok(Package {
            id: conn.last_insert_rowid(),
            uuid,
            key: key.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            created,
            updated: created,
        })
    }

    pub fn get(conn: &Connection, id: PackageId) -> Result<Option<Package>> {
        conn.query_row(
            &format!("SELECT {} FROM packages WHERE id = ?1", COLUMNS),
            [id],
            package_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn get_by_key(conn: &Connection, key: &str) -> Result<Option<Package>> {
        conn.query_row(
            &format!("SELECT {} FROM packages WHERE key = ?1", COLUMNS),
            [key],
            package_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn exists(conn: &Connection, key: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM packages WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(from_rusqlite)?;
        Ok(found.is_some())
    }

    pub fn list(conn: &Connection) -> Result<Vec<Package>> {
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM packages ORDER BY key", COLUMNS))
            .map_err(from_rusqlite)?;
        let packages = stmt
            .query_map([], package_from_row)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(packages)
    }

    /// Apply `changes` and stamp `updated`. Returns false if no row matched.
    pub fn update(
        conn: &Connection,
        id: PackageId,
        changes: &PackageChanges,
        updated: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = conn
            .execute(
                "UPDATE packages SET
                    key = COALESCE(?2, key),
                    title = COALESCE(?3, title),
                    description = COALESCE(?4, description),
                    updated_at = ?5
                 WHERE id = ?1",
                params![
                    id,
                    changes.key,
                    changes.title,
                    changes.description,
                    to_millis(updated)
                ],
            )
            .map_err(from_rusqlite)?;
        Ok(rows == 1)
    }

    /// Remove the package and, through cascades, everything it owns.
    pub fn delete(conn: &Connection, id: PackageId) -> Result<bool> {
        let rows = conn
            .execute("DELETE FROM packages WHERE id = ?1", [id])
            .map_err(from_rusqlite)?;
        Ok(rows == 1)
    }
}
