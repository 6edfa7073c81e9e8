//! Container commands
//!
//! A container version owns an entity list. Unpinned rows resolve to the
//! child's current version on a branch and are recorded as dependencies of
//! the container version; pinned rows always resolve to their pin.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{
    Branch, ChildEntry, ChildKind, ChildRef, ChildrenAction, Container, ContainerKind, ContainerVersion, EntityId,
    EntityListId, NewVersion, PackageId, VersionId,
};
use vellum_core::rules::{validate_children, ChildFacts};
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::{BranchRepo, ComponentRepo, ContainerRepo, EntityListRepo, EntityRepo};
use vellum_store::Result;

use super::drafts::set_draft_version;
use super::entities::{create_entity, insert_version};
use super::{elapsed_ms, require_entity};

/// Input for [`create_next_container_version`].
#[derive(Debug, Clone)]
pub struct NextContainerVersion {
    /// `None` keeps the previous title.
    pub title: Option<String>,
    /// `None` keeps the previous entity list as is.
    pub children: Option<Vec<ChildRef>>,
    pub action: ChildrenAction,
    pub created: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl NextContainerVersion {
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            title: None,
            children: None,
            action: ChildrenAction::Replace,
            created,
            created_by: None,
        }
    }
}

/// Create a container entity of the given kind.
///
/// # Errors
///
/// As [`create_entity`].
pub fn create_container(
    conn: &Connection,
    package_id: PackageId,
    key: &str,
    kind: ContainerKind,
    created: DateTime<Utc>,
    created_by: Option<&str>,
    can_stand_alone: bool,
) -> Result<Container> {
    atomic(conn, |conn| {
        let entity = create_entity(conn, package_id, key, created, created_by, can_stand_alone)?;
        ContainerRepo::insert(conn, entity.id, kind)?;
        Ok(Container { entity, kind })
    })
}

/// Create a container version with the given children and make it the draft.
///
/// # Errors
///
/// `NotAContainer`, `VersionConflict`, or the first child rule violation
/// (`CrossPackageReference`, `PinnedVersionMismatch`, `InvalidChildType`).
/// Nothing is written when validation fails.
pub fn create_container_version(
    conn: &Connection,
    container_id: EntityId,
    version_num: u32,
    title: &str,
    children: &[ChildRef],
    created: DateTime<Utc>,
    created_by: Option<&str>,
) -> Result<ContainerVersion> {
    log_op_start!(
        "create_container_version",
        container_id = container_id,
        version_num = version_num,
        child_count = children.len()
    );
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        let container = require_container(conn, "create_container_version", container_id)?;
        check_children(conn, &container, children)?;
        let list_id = EntityListRepo::create(conn, children)?;
        insert_container_version(conn, &container, version_num, title, list_id, created, created_by)
    })
    .map_err(|e| {
        log_op_error!("create_container_version", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "create_container_version",
        duration_ms = elapsed_ms(start),
        version_id = result.version.id
    );
    Ok(result)
}

/// Create the next container version from the latest one.
///
/// With no `children` the previous entity list is reused unchanged. With
/// `children`, `action` decides how they combine with the previous rows:
/// `Replace` uses them as the whole list, `Append` adds them at the end and
/// `Remove` drops every previous row naming one of their entities.
///
/// # Errors
///
/// As [`create_container_version`].
pub fn create_next_container_version(
    conn: &Connection,
    container_id: EntityId,
    next: NextContainerVersion,
) -> Result<ContainerVersion> {
    log_op_start!("create_next_container_version", container_id = container_id);
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| next_version_impl(conn, container_id, &next)).map_err(|e| {
        log_op_error!("create_next_container_version", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "create_next_container_version",
        duration_ms = elapsed_ms(start),
        version_id = result.version.id,
        version_num = result.version.version_num
    );
    Ok(result)
}

fn next_version_impl(
    conn: &Connection,
    container_id: EntityId,
    next: &NextContainerVersion,
) -> Result<ContainerVersion> {
    let container = require_container(conn, "create_next_container_version", container_id)?;
    let previous = match EntityRepo::latest_version(conn, container_id)? {
        Some(version) => ContainerRepo::get_version(conn, version.id)?,
        None => None,
    };
    let version_num = previous.as_ref().map_or(1, |p| p.version.version_num + 1);
    let title = match (&next.title, &previous) {
        (Some(title), _) => title.clone(),
        (None, Some(previous)) => previous.version.title.clone(),
        (None, None) => String::new(),
    };

    let list_id = match (&next.children, &previous) {
        (None, Some(previous)) => previous.entity_list_id,
        (children, previous) => {
            let base: Vec<ChildRef> = match previous {
                Some(previous) => EntityListRepo::rows(conn, previous.entity_list_id)?
                    .iter()
                    .map(|row| row.as_child_ref())
                    .collect(),
                None => Vec::new(),
            };
            let requested = children.as_deref().unwrap_or_default();
            let merged = merge_children(base, requested, next.action);
            check_children(conn, &container, &merged)?;
            EntityListRepo::create(conn, &merged)?
        }
    };

    insert_container_version(
        conn,
        &container,
        version_num,
        &title,
        list_id,
        next.created,
        next.created_by.as_deref(),
    )
}

fn merge_children(base: Vec<ChildRef>, requested: &[ChildRef], action: ChildrenAction) -> Vec<ChildRef> {
    match action {
        ChildrenAction::Replace => requested.to_vec(),
        ChildrenAction::Append => {
            let mut merged = base;
            merged.extend_from_slice(requested);
            merged
        }
        ChildrenAction::Remove => base
            .into_iter()
            .filter(|child| !requested.iter().any(|r| r.entity_id == child.entity_id))
            .collect(),
    }
}

fn insert_container_version(
    conn: &Connection,
    container: &Container,
    version_num: u32,
    title: &str,
    list_id: EntityListId,
    created: DateTime<Utc>,
    created_by: Option<&str>,
) -> Result<ContainerVersion> {
    let dependencies: Vec<EntityId> = EntityListRepo::rows(conn, list_id)?
        .iter()
        .filter(|row| row.pinned_version_id.is_none())
        .map(|row| row.entity_id)
        .collect();
    let mut new = NewVersion::new(version_num, title, created).with_dependencies(dependencies);
    new.created_by = created_by.map(str::to_string);

    let version = insert_version(conn, container.entity.id, &new)?;
    ContainerRepo::insert_version(conn, version.id, container.entity.id, list_id)?;
    set_draft_version(conn, container.entity.id, Some(version.id), created, created_by)?;
    Ok(ContainerVersion {
        version,
        entity_list_id: list_id,
    })
}

fn check_children(conn: &Connection, container: &Container, children: &[ChildRef]) -> Result<()> {
    let mut facts = Vec::with_capacity(children.len());
    for child in children {
        let entity = require_entity(conn, "create_container_version", child.entity_id)?;
        let kind = if ComponentRepo::is_component(conn, entity.id)? {
            ChildKind::Component
        } else if let Some(kind) = ContainerRepo::kind(conn, entity.id)? {
            ChildKind::Container(kind)
        } else {
            ChildKind::Plain
        };
        let pinned_version_owner = match child.pinned_version_id {
            Some(version_id) => EntityRepo::get_version(conn, version_id)?.map(|v| v.entity_id),
            None => None,
        };
        facts.push(ChildFacts {
            child: *child,
            package_id: entity.package_id,
            kind,
            pinned_version_owner,
        });
    }
    validate_children(container.kind, container.entity.package_id, &facts)
        .map_err(|e| ExError::from(e).with_op("create_container_version"))
}

fn require_container(conn: &Connection, op: &str, container_id: EntityId) -> Result<Container> {
    require_entity(conn, op, container_id)?;
    ContainerRepo::get(conn, container_id)?.ok_or_else(|| {
        ExError::from(VellumError::NotAContainer {
            entity_id: container_id,
        })
        .with_op(op)
    })
}

/// # Errors
///
/// `NotFound` or `NotAContainer`.
pub fn get_container(conn: &Connection, container_id: EntityId) -> Result<Container> {
    require_container(conn, "get_container", container_id)
}

/// # Errors
///
/// `NotFound` if the version is not a container version.
pub fn get_container_version(conn: &Connection, version_id: VersionId) -> Result<ContainerVersion> {
    ContainerRepo::get_version(conn, version_id)?.ok_or_else(|| {
        ExError::from(VellumError::VersionNotFound { version_id }).with_op("get_container_version")
    })
}

/// Children of a container version resolved against `branch`.
///
/// Pinned rows resolve to their pin. Unpinned rows resolve to the child's
/// current branch version and are left out while the child is soft-deleted
/// or absent on the branch.
///
/// # Errors
///
/// `NotFound` if the version is not a container version.
pub fn resolve_children(conn: &Connection, container_version_id: VersionId, branch: Branch) -> Result<Vec<ChildEntry>> {
    let container_version = get_container_version(conn, container_version_id)?;
    let mut resolved = Vec::new();
    for row in EntityListRepo::rows(conn, container_version.entity_list_id)? {
        let entry = match row.pinned_version_id {
            Some(version_id) => Some(ChildEntry {
                entity_id: row.entity_id,
                version_id,
                pinned: true,
            }),
            None => BranchRepo::version_of(conn, branch, row.entity_id)?.map(|version_id| ChildEntry {
                entity_id: row.entity_id,
                version_id,
                pinned: false,
            }),
        };
        resolved.extend(entry);
    }
    Ok(resolved)
}

/// Children of the container's current version on `branch`.
///
/// # Errors
///
/// `NotAContainer`, or `NoBranchVersion` if the container has no live
/// version on the branch.
pub fn entities_in_container(conn: &Connection, container_id: EntityId, branch: Branch) -> Result<Vec<ChildEntry>> {
    require_container(conn, "entities_in_container", container_id)?;
    let version_id = BranchRepo::version_of(conn, branch, container_id)?.ok_or_else(|| {
        ExError::from(VellumError::NoBranchVersion {
            entity_id: container_id,
            branch,
        })
        .with_op("entities_in_container")
    })?;
    resolve_children(conn, version_id, branch)
}

/// Number of resolved children of the container's current branch version.
///
/// # Errors
///
/// As [`entities_in_container`].
pub fn container_children_count(conn: &Connection, container_id: EntityId, branch: Branch) -> Result<usize> {
    Ok(entities_in_container(conn, container_id, branch)?.len())
}

/// Containers whose current branch version lists the entity.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn containers_with_entity(
    conn: &Connection,
    entity_id: EntityId,
    ignore_pinned: bool,
    branch: Branch,
) -> Result<Vec<Container>> {
    require_entity(conn, "containers_with_entity", entity_id)?;
    ContainerRepo::containers_with_entity(conn, branch, entity_id, ignore_pinned)
}

/// Child entity keys of a container version, in list order, pinned and
/// soft-deleted children included.
///
/// # Errors
///
/// `NotFound` if the version is not a container version.
pub fn container_children_keys(conn: &Connection, container_version_id: VersionId) -> Result<Vec<String>> {
    let container_version = get_container_version(conn, container_version_id)?;
    EntityListRepo::child_keys(conn, container_version.entity_list_id)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn list_containers(
    conn: &Connection,
    package_id: PackageId,
    kind: Option<ContainerKind>,
    include_deleted: bool,
) -> Result<Vec<Container>> {
    ContainerRepo::list(conn, package_id, kind, include_deleted)
}
