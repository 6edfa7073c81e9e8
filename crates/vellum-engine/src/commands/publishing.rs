//! Publish orchestration
//!
//! A publish copies draft pointers into Published inside one atomic batch,
//! cascading through unpinned dependencies, then records side effects,
//! recomputes published digests and lets registered observers add their
//! own rows before the transaction commits.

#![allow(clippy::result_large_err)]

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{
    Branch, BranchPointer, EntityId, EntityVersion, LogId, LogRecord, PackageId, PublishLog, VersionId,
};
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::{BranchRepo, EntityRepo, LogRepo};
use vellum_store::Result;

use super::dependency_hash::{current_digest, update_log_hashes};
use super::side_effects::create_side_effects;
use super::{elapsed_ms, require_entity, require_package, require_version};
use crate::observers::ObserverRegistry;

/// How a publish is recorded.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub message: String,
    /// Defaults to now.
    pub published_at: Option<DateTime<Utc>>,
    pub published_by: Option<String>,
    /// Also publish the unpinned dependencies of every requested entity,
    /// transitively.
    pub publish_dependencies: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            message: String::new(),
            published_at: None,
            published_by: None,
            publish_dependencies: true,
        }
    }
}

impl PublishOptions {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Publish the drafts of `entity_ids` and, by default, their unpinned
/// dependencies.
///
/// Entities whose draft already equals published are skipped. If nothing is
/// left no log is written and `None` is returned. Any failure, including an
/// observer error, rolls the whole publish back.
///
/// # Errors
///
/// `NotFound` for an unknown package or entity, `InvalidInput` for an
/// entity of another package, or whatever an observer returns.
pub fn publish_from_drafts(
    conn: &Connection,
    package_id: PackageId,
    entity_ids: &[EntityId],
    options: &PublishOptions,
    observers: &ObserverRegistry,
) -> Result<Option<PublishLog>> {
    log_op_start!(
        "publish",
        package_id = package_id,
        requested = entity_ids.len()
    );
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| publish_impl(conn, package_id, entity_ids, options, observers)).map_err(|e| {
        log_op_error!("publish", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    match &result {
        Some(log) => {
            log_op_end!("publish", duration_ms = elapsed_ms(start), log_id = log.id);
        }
        None => {
            log_op_end!("publish", duration_ms = elapsed_ms(start), skipped = true);
        }
    }
    Ok(result)
}

/// Publish every draft of the package that differs from published,
/// soft deletes included.
///
/// # Errors
///
/// See [`publish_from_drafts`].
pub fn publish_all_drafts(
    conn: &Connection,
    package_id: PackageId,
    options: &PublishOptions,
    observers: &ObserverRegistry,
) -> Result<Option<PublishLog>> {
    let entity_ids: Vec<EntityId> = BranchRepo::unpublished_changes(conn, package_id, true)?
        .into_iter()
        .map(|e| e.id)
        .collect();
    publish_from_drafts(conn, package_id, &entity_ids, options, observers)
}

fn publish_impl(
    conn: &Connection,
    package_id: PackageId,
    entity_ids: &[EntityId],
    options: &PublishOptions,
    observers: &ObserverRegistry,
) -> Result<Option<PublishLog>> {
    require_package(conn, "publish", package_id)?;
    for &entity_id in entity_ids {
        let entity = require_entity(conn, "publish", entity_id)?;
        if entity.package_id != package_id {
            return Err(ExError::from(VellumError::InvalidInput {
                reason: format!(
                    "entity {} belongs to package {}, not {}",
                    entity_id, entity.package_id, package_id
                ),
            })
            .with_op("publish")
            .with_entity_id(entity_id));
        }
    }

    let candidates = if options.publish_dependencies {
        with_dependencies(conn, entity_ids)?
    } else {
        let mut seen = HashSet::new();
        entity_ids.iter().copied().filter(|id| seen.insert(*id)).collect()
    };

    let mut changes: Vec<(EntityId, Option<VersionId>, Option<VersionId>)> = Vec::new();
    for entity_id in candidates {
        let Some(draft) = BranchRepo::get(conn, Branch::Draft, entity_id)? else {
            continue;
        };
        let published = BranchRepo::version_of(conn, Branch::Published, entity_id)?;
        if draft.version_id != published {
            changes.push((entity_id, published, draft.version_id));
        }
    }
    if changes.is_empty() {
        tracing::debug!(package_id, "nothing to publish");
        return Ok(None);
    }

    let log = LogRepo::create_publish_log(
        conn,
        package_id,
        &options.message,
        options.published_at.unwrap_or_else(Utc::now),
        options.published_by.as_deref(),
    )?;
    for &(entity_id, old_version_id, new_version_id) in &changes {
        let record = LogRepo::insert_record(
            conn,
            Branch::Published,
            log.id,
            entity_id,
            old_version_id,
            new_version_id,
        )?;
        BranchRepo::upsert(
            conn,
            Branch::Published,
            &BranchPointer {
                entity_id,
                version_id: new_version_id,
                log_record_id: Some(record.id),
            },
        )?;
    }

    create_side_effects(conn, Branch::Published, log.id)?;
    update_log_hashes(conn, Branch::Published, log.id)?;
    observers.notify_pre_commit(conn, &log)?;

    tracing::debug!(log_id = log.id, published = changes.len(), "publish batch complete");
    Ok(Some(log))
}

/// Requested entities followed by everything reachable through the
/// dependencies of their draft versions, each once.
fn with_dependencies(conn: &Connection, entity_ids: &[EntityId]) -> Result<Vec<EntityId>> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut queue: VecDeque<EntityId> = entity_ids.iter().copied().collect();

    while let Some(entity_id) = queue.pop_front() {
        if !seen.insert(entity_id) {
            continue;
        }
        ordered.push(entity_id);
        if let Some(version_id) = BranchRepo::version_of(conn, Branch::Draft, entity_id)? {
            queue.extend(EntityRepo::dependencies(conn, version_id)?);
        }
    }
    Ok(ordered)
}

/// Deep check for unpublished changes.
///
/// True when the draft and published versions differ, or when they are the
/// same but the draft digest differs from the published digest, which
/// happens when something reachable through unpinned dependencies changed.
/// An entity with neither a draft nor a published version has nothing to
/// publish.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn contains_unpublished_changes(conn: &Connection, entity_id: EntityId) -> Result<bool> {
    require_entity(conn, "contains_unpublished_changes", entity_id)?;
    let draft = BranchRepo::version_of(conn, Branch::Draft, entity_id)?;
    let published = BranchRepo::version_of(conn, Branch::Published, entity_id)?;
    if draft != published {
        return Ok(true);
    }
    if draft.is_none() {
        return Ok(false);
    }
    let draft_digest = current_digest(conn, Branch::Draft, entity_id)?;
    let published_digest = current_digest(conn, Branch::Published, entity_id)?;
    Ok(draft_digest != published_digest)
}

/// # Errors
///
/// `NotFound` if the log does not exist.
pub fn get_publish_log(conn: &Connection, log_id: LogId) -> Result<PublishLog> {
    LogRepo::get_publish_log(conn, log_id)?.ok_or_else(|| {
        ExError::from(VellumError::LogNotFound {
            branch: Branch::Published,
            log_id,
        })
        .with_op("get_publish_log")
        .with_log_id(log_id)
    })
}

/// Records of a publish log, direct and side-effect, in insertion order.
///
/// # Errors
///
/// `NotFound` if the log does not exist.
pub fn publish_log_records(conn: &Connection, log_id: LogId) -> Result<Vec<LogRecord>> {
    get_publish_log(conn, log_id)?;
    LogRepo::records_for_log(conn, Branch::Published, log_id)
}

/// Publish logs of the package, oldest first.
///
/// # Errors
///
/// Propagates persistence errors.
pub fn list_publish_logs(conn: &Connection, package_id: PackageId) -> Result<Vec<PublishLog>> {
    LogRepo::list_publish_logs(conn, package_id)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn get_last_publish(conn: &Connection, package_id: PackageId) -> Result<Option<PublishLog>> {
    LogRepo::last_publish_log(conn, package_id)
}

/// The entity's published version immediately after publish log `log_id`;
/// `None` if it was unpublished or soft-deleted at that point.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn get_published_version_as_of(
    conn: &Connection,
    entity_id: EntityId,
    log_id: LogId,
) -> Result<Option<EntityVersion>> {
    require_entity(conn, "get_published_version_as_of", entity_id)?;
    let record = LogRepo::published_record_as_of(conn, entity_id, log_id)?;
    match record.and_then(|r| r.new_version_id) {
        Some(version_id) => Ok(Some(require_version(conn, "get_published_version_as_of", version_id)?)),
        None => Ok(None),
    }
}
