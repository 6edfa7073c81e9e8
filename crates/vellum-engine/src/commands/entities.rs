//! Entity store commands
//!
//! Entities and versions are create-only. A new version becomes the
//! entity's draft as part of the same atomic write.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{Entity, EntityId, EntityVersion, NewVersion, PackageId, VersionId};
use vellum_core::rules::{validate_key, validate_title};
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::EntityRepo;
use vellum_store::Result;

use super::drafts::set_draft_version;
use super::{elapsed_ms, require_entity, require_package, require_version};

/// Create an entity with no versions.
///
/// # Errors
///
/// `InvalidKey` for a malformed key, `NotFound` for an unknown package,
/// `AlreadyExists` if the key is taken within the package.
pub fn create_entity(
    conn: &Connection,
    package_id: PackageId,
    key: &str,
    created: DateTime<Utc>,
    created_by: Option<&str>,
    can_stand_alone: bool,
) -> Result<Entity> {
    validate_key(key).map_err(|e| ExError::from(e).with_op("create_entity"))?;
    atomic(conn, |conn| {
        require_package(conn, "create_entity", package_id)?;
        EntityRepo::insert(conn, package_id, key, created, created_by, can_stand_alone)
    })
}

/// # Errors
///
/// `NotFound` if the entity does not exist.
pub fn get_entity(conn: &Connection, entity_id: EntityId) -> Result<Entity> {
    require_entity(conn, "get_entity", entity_id)
}

/// # Errors
///
/// `NotFound` if no entity has this key in the package.
pub fn get_entity_by_key(conn: &Connection, package_id: PackageId, key: &str) -> Result<Entity> {
    EntityRepo::get_by_key(conn, package_id, key)?.ok_or_else(|| {
        ExError::from(VellumError::EntityKeyNotFound {
            package_id,
            key: key.to_string(),
        })
        .with_op("get_entity_by_key")
    })
}

/// # Errors
///
/// `NotFound` if no entity has this uuid.
pub fn get_entity_by_uuid(conn: &Connection, uuid: &Uuid) -> Result<Entity> {
    EntityRepo::get_by_uuid(conn, uuid)?.ok_or_else(|| {
        ExError::new(vellum_core::ExErrorKind::NotFound)
            .with_op("get_entity_by_uuid")
            .with_message(format!("Entity not found for uuid {}", uuid))
    })
}

/// # Errors
///
/// Propagates persistence errors.
pub fn list_entities(conn: &Connection, package_id: PackageId) -> Result<Vec<Entity>> {
    EntityRepo::list(conn, package_id)
}

/// Create the next version of an entity and make it the draft.
///
/// `new.version_num` must be exactly one more than the latest version (1 for
/// the first). Two writers racing for the same number both read the same
/// latest version; the store's uniqueness constraint lets one through and
/// the other gets `VersionConflict`, and must re-read and retry.
///
/// # Errors
///
/// `NotFound` for an unknown entity, `VersionConflict` on a stale or racing
/// version number, validation errors for the title or dependencies.
pub fn create_version(conn: &Connection, entity_id: EntityId, new: NewVersion) -> Result<EntityVersion> {
    log_op_start!(
        "create_version",
        entity_id = entity_id,
        version_num = new.version_num
    );
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        let version = insert_version(conn, entity_id, &new)?;
        set_draft_version(conn, entity_id, Some(version.id), new.created, new.created_by.as_deref())?;
        Ok(version)
    })
    .map_err(|e| {
        log_op_error!("create_version", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "create_version",
        duration_ms = elapsed_ms(start),
        version_id = result.id
    );
    Ok(result)
}

/// Insert the version row and its dependencies without touching the draft.
/// Container and component versions add their own rows in between.
pub(crate) fn insert_version(conn: &Connection, entity_id: EntityId, new: &NewVersion) -> Result<EntityVersion> {
    validate_title(&new.title, true).map_err(|e| ExError::from(e).with_op("create_version"))?;
    let entity = require_entity(conn, "create_version", entity_id)?;

    let latest = EntityRepo::latest_version_num(conn, entity_id)?;
    if new.version_num != latest + 1 {
        return Err(ExError::from(VellumError::VersionConflict {
            entity_id,
            expected: latest + 1,
            requested: new.version_num,
        })
        .with_op("create_version"));
    }

    let mut dependencies = new.dependencies.clone();
    dependencies.sort_unstable();
    dependencies.dedup();
    check_dependencies(conn, &entity, &dependencies)?;

    let version = EntityRepo::insert_version(conn, entity_id, new)?;
    EntityRepo::insert_dependencies(conn, version.id, &dependencies)?;
    tracing::debug!(
        entity_id,
        version_id = version.id,
        dependency_count = dependencies.len(),
        "inserted version"
    );
    Ok(version)
}

fn check_dependencies(conn: &Connection, entity: &Entity, dependencies: &[EntityId]) -> Result<()> {
    for &dependency in dependencies {
        let dep = require_entity(conn, "create_version", dependency)?;
        if dep.package_id != entity.package_id {
            return Err(ExError::from(VellumError::CrossPackageReference {
                package_id: entity.package_id,
                child_id: dep.id,
                child_package_id: dep.package_id,
            })
            .with_op("create_version"));
        }
    }
    Ok(())
}

/// Replace nothing, only add: record that `version_id` depends on
/// `dependencies`. Used when backfilling versions created before their
/// dependencies were tracked.
///
/// # Errors
///
/// `NotFound` for an unknown version or dependency, `CrossPackageReference`
/// for a dependency in another package.
pub fn set_version_dependencies(
    conn: &Connection,
    version_id: VersionId,
    dependencies: &[EntityId],
) -> Result<()> {
    atomic(conn, |conn| {
        let version = require_version(conn, "set_version_dependencies", version_id)?;
        let entity = require_entity(conn, "set_version_dependencies", version.entity_id)?;
        check_dependencies(conn, &entity, dependencies)?;
        EntityRepo::insert_dependencies(conn, version_id, dependencies)
    })
}

/// # Errors
///
/// `NotFound` if the version does not exist.
pub fn get_version(conn: &Connection, version_id: VersionId) -> Result<EntityVersion> {
    require_version(conn, "get_version", version_id)
}

/// # Errors
///
/// `NotFound` if no version has this uuid.
pub fn get_version_by_uuid(conn: &Connection, uuid: &Uuid) -> Result<EntityVersion> {
    EntityRepo::get_version_by_uuid(conn, uuid)?.ok_or_else(|| {
        ExError::new(vellum_core::ExErrorKind::NotFound)
            .with_op("get_version_by_uuid")
            .with_message(format!("Version not found for uuid {}", uuid))
    })
}

/// Highest-numbered version, regardless of what the draft points at.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn get_latest_version(conn: &Connection, entity_id: EntityId) -> Result<Option<EntityVersion>> {
    require_entity(conn, "get_latest_version", entity_id)?;
    EntityRepo::latest_version(conn, entity_id)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn list_versions(conn: &Connection, entity_id: EntityId) -> Result<Vec<EntityVersion>> {
    EntityRepo::list_versions(conn, entity_id)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn version_dependencies(conn: &Connection, version_id: VersionId) -> Result<Vec<EntityId>> {
    EntityRepo::dependencies(conn, version_id)
}
