//! Component commands
//!
//! Components are the leaves of the container tree. Each version holds a
//! `key -> content digest` map; the payloads live in an external blob store.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{Component, ComponentType, ContentEntry, EntityId, EntityVersion, NewVersion, PackageId, VersionId};
use vellum_core::rules::validate_key;
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::{ComponentRepo, EntityRepo};
use vellum_store::Result;

use super::drafts::set_draft_version;
use super::entities::{create_entity, insert_version};
use super::{elapsed_ms, require_entity, require_version};

/// Create a component. Its entity key is `namespace:name:local_key`.
///
/// # Errors
///
/// `InvalidKey` for a malformed local key, `AlreadyExists` if the package
/// already has this component.
pub fn create_component(
    conn: &Connection,
    package_id: PackageId,
    component_type: &ComponentType,
    local_key: &str,
    created: DateTime<Utc>,
    created_by: Option<&str>,
    can_stand_alone: bool,
) -> Result<Component> {
    validate_key(local_key).map_err(|e| ExError::from(e).with_op("create_component"))?;
    atomic(conn, |conn| {
        let key = format!("{}:{}", component_type, local_key);
        let entity = create_entity(conn, package_id, &key, created, created_by, can_stand_alone)?;
        let type_id = ComponentRepo::get_or_create_type(conn, component_type)?;
        ComponentRepo::insert(conn, entity.id, package_id, type_id, local_key)?;
        Ok(Component {
            entity,
            component_type: component_type.clone(),
            local_key: local_key.to_string(),
        })
    })
}

/// Create a component version with exactly `contents` and make it the draft.
///
/// # Errors
///
/// `NotAComponent`, `VersionConflict`, `InvalidInput` for a duplicate key.
pub fn create_component_version(
    conn: &Connection,
    component_id: EntityId,
    version_num: u32,
    title: &str,
    contents: &[ContentEntry],
    created: DateTime<Utc>,
    created_by: Option<&str>,
) -> Result<EntityVersion> {
    log_op_start!(
        "create_component_version",
        component_id = component_id,
        version_num = version_num
    );
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        require_component(conn, "create_component_version", component_id)?;
        insert_component_version(conn, component_id, version_num, title, contents, created, created_by)
    })
    .map_err(|e| {
        log_op_error!("create_component_version", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "create_component_version",
        duration_ms = elapsed_ms(start),
        version_id = result.id
    );
    Ok(result)
}

/// Create the next component version from the latest one.
///
/// Every previous mapping not named in `content_to_replace` carries forward
/// with its download flag. `Some(digest)` adds or replaces a key (new keys
/// are not learner-downloadable); `None` removes it, and removing an absent
/// key is not an error. A `None` title keeps the previous title.
///
/// # Errors
///
/// `NotAComponent`, or `VersionConflict` if another writer created the
/// same version number first.
pub fn create_next_component_version(
    conn: &Connection,
    component_id: EntityId,
    content_to_replace: &BTreeMap<String, Option<String>>,
    title: Option<&str>,
    created: DateTime<Utc>,
    created_by: Option<&str>,
) -> Result<EntityVersion> {
    log_op_start!(
        "create_next_component_version",
        component_id = component_id,
        replaced = content_to_replace.len()
    );
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        require_component(conn, "create_next_component_version", component_id)?;
        let previous = EntityRepo::latest_version(conn, component_id)?;

        let mut contents: BTreeMap<String, ContentEntry> = BTreeMap::new();
        if let Some(previous) = &previous {
            for entry in ComponentRepo::contents(conn, previous.id)? {
                contents.insert(entry.key.clone(), entry);
            }
        }
        for (key, digest) in content_to_replace {
            match digest {
                Some(digest) => {
                    let downloadable = contents.get(key).is_some_and(|e| e.learner_downloadable);
                    contents.insert(
                        key.clone(),
                        ContentEntry {
                            key: key.clone(),
                            content_digest: digest.clone(),
                            learner_downloadable: downloadable,
                        },
                    );
                }
                None => {
                    contents.remove(key);
                }
            }
        }

        let version_num = previous.as_ref().map_or(1, |p| p.version_num + 1);
        let title = match (title, &previous) {
            (Some(title), _) => title.to_string(),
            (None, Some(previous)) => previous.title.clone(),
            (None, None) => String::new(),
        };
        let contents: Vec<ContentEntry> = contents.into_values().collect();
        insert_component_version(conn, component_id, version_num, &title, &contents, created, created_by)
    })
    .map_err(|e| {
        log_op_error!("create_next_component_version", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "create_next_component_version",
        duration_ms = elapsed_ms(start),
        version_id = result.id,
        version_num = result.version_num
    );
    Ok(result)
}

fn insert_component_version(
    conn: &Connection,
    component_id: EntityId,
    version_num: u32,
    title: &str,
    contents: &[ContentEntry],
    created: DateTime<Utc>,
    created_by: Option<&str>,
) -> Result<EntityVersion> {
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = contents.iter().find(|e| !seen.insert(e.key.as_str())) {
        return Err(ExError::from(VellumError::InvalidInput {
            reason: format!("duplicate content key '{}'", dup.key),
        })
        .with_op("create_component_version")
        .with_entity_id(component_id));
    }

    let mut new = NewVersion::new(version_num, title, created);
    new.created_by = created_by.map(str::to_string);
    let version = insert_version(conn, component_id, &new)?;
    ComponentRepo::insert_version(conn, version.id, component_id)?;
    ComponentRepo::insert_contents(conn, version.id, contents)?;
    set_draft_version(conn, component_id, Some(version.id), created, created_by)?;
    Ok(version)
}

fn require_component(conn: &Connection, op: &str, component_id: EntityId) -> Result<Component> {
    require_entity(conn, op, component_id)?;
    ComponentRepo::get(conn, component_id)?.ok_or_else(|| {
        ExError::from(VellumError::NotAComponent {
            entity_id: component_id,
        })
        .with_op(op)
    })
}

/// # Errors
///
/// `NotFound` or `NotAComponent`.
pub fn get_component(conn: &Connection, component_id: EntityId) -> Result<Component> {
    require_component(conn, "get_component", component_id)
}

/// # Errors
///
/// `NotFound` if the package has no such component.
pub fn get_component_by_key(
    conn: &Connection,
    package_id: PackageId,
    component_type: &ComponentType,
    local_key: &str,
) -> Result<Component> {
    ComponentRepo::get_by_key(conn, package_id, component_type, local_key)?.ok_or_else(|| {
        ExError::from(VellumError::EntityKeyNotFound {
            package_id,
            key: format!("{}:{}", component_type, local_key),
        })
        .with_op("get_component_by_key")
    })
}

/// # Errors
///
/// Propagates persistence errors.
pub fn list_components(conn: &Connection, package_id: PackageId) -> Result<Vec<Component>> {
    ComponentRepo::list(conn, package_id)
}

/// Content map of a component version, ordered by key.
///
/// # Errors
///
/// `NotFound` for an unknown version.
pub fn component_version_contents(conn: &Connection, version_id: VersionId) -> Result<Vec<ContentEntry>> {
    require_version(conn, "component_version_contents", version_id)?;
    ComponentRepo::contents(conn, version_id)
}
