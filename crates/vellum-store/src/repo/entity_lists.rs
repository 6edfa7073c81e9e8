//! Immutable ordered child lists
//!
//! A list is written once when a container version is created and shared,
//! unchanged, by later versions that keep the same children.

#![allow(clippy::result_large_err)]

use rusqlite::{params, Connection};
use vellum_core::model::{ChildRef, EntityListId, EntityListRow};

use super::rows::u32_at;
use crate::errors::{from_rusqlite, Result};

pub struct EntityListRepo;

impl EntityListRepo {
    /// Store `children` as a new list, numbering rows from 0 in order.
    pub fn create(conn: &Connection, children: &[ChildRef]) -> Result<EntityListId> {
        conn.execute("INSERT INTO entity_lists DEFAULT VALUES", [])
            .map_err(from_rusqlite)?;
        let list_id = conn.last_insert_rowid();

        let mut stmt = conn
            .prepare(
                "INSERT INTO entity_list_rows (entity_list_id, order_num, entity_id, entity_version_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(from_rusqlite)?;
        for (order_num, child) in children.iter().enumerate() {
            stmt.execute(params![
                list_id,
                order_num as i64,
                child.entity_id,
                child.pinned_version_id
            ])
            .map_err(from_rusqlite)?;
        }
        Ok(list_id)
    }

    pub fn rows(conn: &Connection, list_id: EntityListId) -> Result<Vec<EntityListRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT entity_list_id, order_num, entity_id, entity_version_id
                 FROM entity_list_rows WHERE entity_list_id = ?1 ORDER BY order_num",
            )
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([list_id], |row| {
                Ok(EntityListRow {
                    entity_list_id: row.get(0)?,
                    order_num: u32_at(row, 1)?,
                    entity_id: row.get(2)?,
                    pinned_version_id: row.get(3)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(rows)
    }

    /// Keys of the listed entities, in list order.
    pub fn child_keys(conn: &Connection, list_id: EntityListId) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(
                "SELECT e.key FROM entity_list_rows r JOIN entities e ON e.id = r.entity_id
                 WHERE r.entity_list_id = ?1 ORDER BY r.order_num",
            )
            .map_err(from_rusqlite)?;
        let keys = stmt
            .query_map([list_id], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(from_rusqlite)?;
        Ok(keys)
    }
}
