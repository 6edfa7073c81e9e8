//! Digest maintenance for log records
//!
//! Incremental updates trust every record outside the log being closed and
//! reuse its stored digest. Backfill trusts nothing.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use vellum_core::hashing::compute_digests;
use vellum_core::model::{Branch, EntityId, LogId, PackageId, RecordId};
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::{BranchRepo, LogRepo, SqlRecordGraph};
use vellum_store::Result;

use super::{elapsed_ms, require_package};

/// Recompute and store the digest of every record in the log.
///
/// # Errors
///
/// `CycleDetected` if the dependency graph loops back on itself, otherwise
/// persistence errors.
pub fn update_log_hashes(conn: &Connection, branch: Branch, log_id: LogId) -> Result<()> {
    let records: Vec<RecordId> = LogRepo::records_for_log(conn, branch, log_id)?
        .into_iter()
        .map(|r| r.id)
        .collect();
    store_digests(conn, branch, &records)?;
    tracing::debug!(log_id, branch = %branch, records = records.len(), "log digests updated");
    Ok(())
}

/// Recompute the digest of every record a branch pointer of the package
/// currently references, with no trusted cache.
///
/// Returns the number of records rewritten.
///
/// # Errors
///
/// `NotFound` for an unknown package, `CycleDetected` on a dependency loop.
pub fn backfill_dependency_hashes(conn: &Connection, package_id: PackageId, branch: Branch) -> Result<usize> {
    log_op_start!("backfill_dependency_hashes", package_id = package_id, branch = %branch);
    let start = std::time::Instant::now();

    let result = atomic(conn, |conn| {
        require_package(conn, "backfill_dependency_hashes", package_id)?;
        let records: Vec<RecordId> = LogRepo::current_records(conn, branch, package_id)?
            .into_iter()
            .map(|r| r.id)
            .collect();
        store_digests(conn, branch, &records)?;
        Ok(records.len())
    })
    .map_err(|e| {
        log_op_error!("backfill_dependency_hashes", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "backfill_dependency_hashes",
        duration_ms = elapsed_ms(start),
        record_count = result
    );
    Ok(result)
}

fn store_digests(conn: &Connection, branch: Branch, records: &[RecordId]) -> Result<()> {
    let graph = SqlRecordGraph::new(conn, branch);
    for (record_id, digest) in compute_digests(&graph, records)? {
        LogRepo::set_digest(conn, branch, record_id, &digest)?;
    }
    Ok(())
}

/// Digest stored on the record the branch pointer references; empty when the
/// entity has no pointer or record on the branch.
///
/// # Errors
///
/// Propagates persistence errors.
pub fn current_digest(conn: &Connection, branch: Branch, entity_id: EntityId) -> Result<String> {
    let pointer = BranchRepo::get(conn, branch, entity_id)?;
    let Some(record_id) = pointer.and_then(|p| p.log_record_id) else {
        return Ok(String::new());
    };
    Ok(LogRepo::get_record(conn, branch, record_id)?
        .map(|r| r.dependencies_hash_digest)
        .unwrap_or_default())
}
