//! Draft registry and draft change batches
//!
//! Every change to a Draft pointer is recorded in a draft change log. Inside
//! a batch ([`bulk_draft_changes_for`]) changes to the same entity collapse
//! into one record; outside a batch each change gets a log of its own.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{
    Branch, BranchPointer, DraftChangeLog, Entity, EntityId, EntityVersion, LogId, LogRecord, PackageId,
    VersionId,
};
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::{BranchRepo, LogRepo};
use vellum_store::Result;

use super::dependency_hash::update_log_hashes;
use super::side_effects::create_side_effects;
use super::{elapsed_ms, require_entity, require_package, require_version};
use crate::context::{active_log, ActiveLog, LogScope};

/// Point the entity's draft at `version_id`, or soft-delete it with `None`.
///
/// Unchanged pointers are left alone and nothing is logged.
///
/// # Errors
///
/// `NotFound` for an unknown entity or version, `InvalidInput` if the
/// version belongs to another entity.
pub fn set_draft_version(
    conn: &Connection,
    entity_id: EntityId,
    version_id: Option<VersionId>,
    changed_at: DateTime<Utc>,
    changed_by: Option<&str>,
) -> Result<()> {
    atomic(conn, |conn| {
        let entity = require_entity(conn, "set_draft_version", entity_id)?;
        if let Some(version_id) = version_id {
            let version = require_version(conn, "set_draft_version", version_id)?;
            if version.entity_id != entity_id {
                return Err(ExError::from(VellumError::InvalidInput {
                    reason: format!("version {} does not belong to entity {}", version_id, entity_id),
                })
                .with_op("set_draft_version")
                .with_entity_id(entity_id));
            }
        }

        let old_version_id = BranchRepo::version_of(conn, Branch::Draft, entity_id)?;
        if old_version_id == version_id {
            return Ok(());
        }

        match active_log(Branch::Draft, entity.package_id) {
            Some(log) => record_in_batch(conn, log.log_id, entity_id, old_version_id, version_id),
            None => {
                let log = LogRepo::create_draft_log(conn, entity.package_id, changed_at, changed_by)?;
                let record =
                    LogRepo::insert_record(conn, Branch::Draft, log.id, entity_id, old_version_id, version_id)?;
                BranchRepo::upsert(
                    conn,
                    Branch::Draft,
                    &BranchPointer {
                        entity_id,
                        version_id,
                        log_record_id: Some(record.id),
                    },
                )?;
                close_draft_log(conn, log.id)
            }
        }
    })
}

/// Collapse a change into the batch's record for the entity.
fn record_in_batch(
    conn: &Connection,
    log_id: LogId,
    entity_id: EntityId,
    old_version_id: Option<VersionId>,
    version_id: Option<VersionId>,
) -> Result<()> {
    let log_record_id = match LogRepo::find_record(conn, Branch::Draft, log_id, entity_id)? {
        Some(record) if record.old_version_id == version_id => {
            // Back where the batch started: the batch no longer changes this entity.
            LogRepo::delete_record(conn, Branch::Draft, record.id)?;
            LogRepo::latest_record_for_entity(conn, Branch::Draft, entity_id)?.map(|r| r.id)
        }
        Some(record) => {
            LogRepo::update_new_version(conn, Branch::Draft, record.id, version_id)?;
            Some(record.id)
        }
        None => {
            let record = LogRepo::insert_record(conn, Branch::Draft, log_id, entity_id, old_version_id, version_id)?;
            Some(record.id)
        }
    };
    BranchRepo::upsert(
        conn,
        Branch::Draft,
        &BranchPointer {
            entity_id,
            version_id,
            log_record_id,
        },
    )
}

/// Side effects and digests for a finished draft log; an empty log is removed.
fn close_draft_log(conn: &Connection, log_id: LogId) -> Result<()> {
    if LogRepo::count_records(conn, Branch::Draft, log_id)? == 0 {
        tracing::debug!(log_id, "deleting empty draft log");
        return LogRepo::delete_log(conn, Branch::Draft, log_id);
    }
    create_side_effects(conn, Branch::Draft, log_id)?;
    update_log_hashes(conn, Branch::Draft, log_id)
}

/// Soft-delete the entity's draft. Published state is untouched.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn soft_delete_draft(
    conn: &Connection,
    entity_id: EntityId,
    changed_at: DateTime<Utc>,
    changed_by: Option<&str>,
) -> Result<()> {
    set_draft_version(conn, entity_id, None, changed_at, changed_by)
}

/// Run `f` as one draft batch for the package.
///
/// All draft changes `f` makes to entities of `package_id`, however deep in
/// the call stack, land in one log. On success side effects and digests
/// are computed and an empty log is deleted. On error nothing persists.
///
/// # Errors
///
/// `NotFound` for an unknown package, or whatever `f` returns.
pub fn bulk_draft_changes_for<T, F>(
    conn: &Connection,
    package_id: PackageId,
    changed_by: Option<&str>,
    changed_at: DateTime<Utc>,
    f: F,
) -> Result<T>
where
    F: FnOnce(&Connection, &DraftChangeLog) -> Result<T>,
{
    log_op_start!("bulk_draft_changes", package_id = package_id);
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        require_package(conn, "bulk_draft_changes", package_id)?;
        let log = LogRepo::create_draft_log(conn, package_id, changed_at, changed_by)?;
        let value = {
            let _scope = LogScope::enter(ActiveLog {
                branch: Branch::Draft,
                log_id: log.id,
                package_id,
            });
            f(conn, &log)?
        };
        close_draft_log(conn, log.id)?;
        Ok(value)
    })
    .map_err(|e| {
        log_op_error!("bulk_draft_changes", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!("bulk_draft_changes", duration_ms = elapsed_ms(start));
    Ok(result)
}

/// Point every draft that differs from its published version back at the
/// published version, as one draft change.
///
/// Returns the number of drafts reset; zero leaves no log behind.
///
/// # Errors
///
/// `NotFound` for an unknown package.
pub fn reset_drafts_to_published(
    conn: &Connection,
    package_id: PackageId,
    changed_at: DateTime<Utc>,
    changed_by: Option<&str>,
) -> Result<usize> {
    log_op_start!("reset_drafts_to_published", package_id = package_id);
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        require_package(conn, "reset_drafts_to_published", package_id)?;
        let differing = BranchRepo::drafts_differing_from_published(conn, package_id)?;
        if differing.is_empty() {
            return Ok(0);
        }
        let reset = |conn: &Connection| -> Result<usize> {
            for &(entity_id, published) in &differing {
                set_draft_version(conn, entity_id, published, changed_at, changed_by)?;
            }
            Ok(differing.len())
        };
        if active_log(Branch::Draft, package_id).is_some() {
            reset(conn)
        } else {
            bulk_draft_changes_for(conn, package_id, changed_by, changed_at, |conn, _| reset(conn))
        }
    })
    .map_err(|e| {
        log_op_error!("reset_drafts_to_published", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "reset_drafts_to_published",
        duration_ms = elapsed_ms(start),
        reset_count = result
    );
    Ok(result)
}

/// Current draft version; `None` if never drafted or soft-deleted.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn get_draft(conn: &Connection, entity_id: EntityId) -> Result<Option<EntityVersion>> {
    branch_version(conn, Branch::Draft, entity_id, "get_draft")
}

/// Current published version; `None` if never published or soft-deleted.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn get_published(conn: &Connection, entity_id: EntityId) -> Result<Option<EntityVersion>> {
    branch_version(conn, Branch::Published, entity_id, "get_published")
}

fn branch_version(conn: &Connection, branch: Branch, entity_id: EntityId, op: &str) -> Result<Option<EntityVersion>> {
    require_entity(conn, op, entity_id)?;
    match BranchRepo::version_of(conn, branch, entity_id)? {
        Some(version_id) => Ok(Some(require_version(conn, op, version_id)?)),
        None => Ok(None),
    }
}

/// Draft pointers of every entity in the package, soft-deleted ones included.
///
/// # Errors
///
/// Propagates persistence errors.
pub fn get_all_drafts(conn: &Connection, package_id: PackageId) -> Result<Vec<BranchPointer>> {
    BranchRepo::list(conn, Branch::Draft, package_id)
}

/// Shallow check: the draft and published pointers name different versions.
/// Dependencies are not inspected.
///
/// # Errors
///
/// `NotFound` for an unknown entity.
pub fn has_unpublished_changes(conn: &Connection, entity_id: EntityId) -> Result<bool> {
    require_entity(conn, "has_unpublished_changes", entity_id)?;
    let draft = BranchRepo::version_of(conn, Branch::Draft, entity_id)?;
    let published = BranchRepo::version_of(conn, Branch::Published, entity_id)?;
    Ok(draft != published)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn get_entities_with_unpublished_changes(
    conn: &Connection,
    package_id: PackageId,
    include_deleted_drafts: bool,
) -> Result<Vec<Entity>> {
    BranchRepo::unpublished_changes(conn, package_id, include_deleted_drafts)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn get_entities_with_unpublished_deletes(conn: &Connection, package_id: PackageId) -> Result<Vec<Entity>> {
    BranchRepo::unpublished_deletes(conn, package_id)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn filter_entities(
    conn: &Connection,
    package_id: PackageId,
    has_draft: Option<bool>,
    has_published: Option<bool>,
) -> Result<Vec<Entity>> {
    BranchRepo::filter_entities(conn, package_id, has_draft, has_published)
}

/// A draft change log and its records in insertion order.
///
/// # Errors
///
/// `NotFound` if the log does not exist.
pub fn get_draft_change_log(conn: &Connection, log_id: LogId) -> Result<(DraftChangeLog, Vec<LogRecord>)> {
    let log = LogRepo::get_draft_log(conn, log_id)?.ok_or_else(|| {
        ExError::from(VellumError::LogNotFound {
            branch: Branch::Draft,
            log_id,
        })
        .with_op("get_draft_change_log")
    })?;
    let records = LogRepo::records_for_log(conn, Branch::Draft, log_id)?;
    Ok((log, records))
}

/// # Errors
///
/// Propagates persistence errors.
pub fn list_draft_change_logs(conn: &Connection, package_id: PackageId) -> Result<Vec<DraftChangeLog>> {
    LogRepo::list_draft_logs(conn, package_id)
}

