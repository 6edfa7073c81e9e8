//! Point-in-time reads of published containers
//!
//! A snapshot replays publish records: for the container and for each
//! unpinned child, the most recent record in a log no newer than the
//! requested one names the version that was published at that point.
//! Publish records are never rewritten, so a snapshot for a given log never
//! changes.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{ChildEntry, ContainerSnapshot, EntityId, LogId, VersionId};
use vellum_store::repo::{ContainerRepo, EntityListRepo, LogRepo};
use vellum_store::Result;

use super::publishing::get_publish_log;
use super::{require_entity, require_version};

/// The container as published immediately after publish log `log_id`.
///
/// Returns `None` if the container had no live published version at that
/// point. Unpinned children that were unpublished or soft-deleted then are
/// left out.
///
/// # Errors
///
/// `NotFound` for an unknown container or log, `NotAContainer` if the
/// entity is not a container.
pub fn as_of(conn: &Connection, container_id: EntityId, log_id: LogId) -> Result<Option<ContainerSnapshot>> {
    require_entity(conn, "snapshot_as_of", container_id)?;
    if ContainerRepo::get(conn, container_id)?.is_none() {
        return Err(ExError::from(VellumError::NotAContainer {
            entity_id: container_id,
        })
        .with_op("snapshot_as_of"));
    }
    get_publish_log(conn, log_id)?;

    let Some(version_id) = published_version_at(conn, container_id, log_id)? else {
        return Ok(None);
    };
    let container_version = ContainerRepo::get_version(conn, version_id)?.ok_or_else(|| {
        ExError::from(VellumError::VersionNotFound { version_id }).with_op("snapshot_as_of")
    })?;

    let mut children = Vec::new();
    for row in EntityListRepo::rows(conn, container_version.entity_list_id)? {
        match row.pinned_version_id {
            Some(pinned) => children.push(ChildEntry {
                entity_id: row.entity_id,
                version_id: pinned,
                pinned: true,
            }),
            None => {
                if let Some(child_version) = published_version_at(conn, row.entity_id, log_id)? {
                    children.push(ChildEntry {
                        entity_id: row.entity_id,
                        version_id: child_version,
                        pinned: false,
                    });
                }
            }
        }
    }

    Ok(Some(ContainerSnapshot {
        container_version: require_version(conn, "snapshot_as_of", version_id)?,
        children,
    }))
}

fn published_version_at(conn: &Connection, entity_id: EntityId, log_id: LogId) -> Result<Option<VersionId>> {
    Ok(LogRepo::published_record_as_of(conn, entity_id, log_id)?.and_then(|r| r.new_version_id))
}
