//! Side-effect propagation
//!
//! When an entity changes on a branch, everything whose current branch
//! version depends on it changes meaning too. Each such dependent gets a
//! record in the same log (old == new when it did not change itself), its
//! branch pointer moves to that record, and a (cause, effect) row links the
//! two. Propagation walks upward layer by layer and visits each entity once
//! per log.

#![allow(clippy::result_large_err)]

use std::collections::{HashSet, VecDeque};

use rusqlite::Connection;
use vellum_core::model::{Branch, LogId, LogRecord, SideEffect};
use vellum_store::repo::{BranchRepo, LogRepo};
use vellum_store::Result;

/// Add side-effect records for every record of the log.
///
/// Returns the number of (cause, effect) pairs recorded.
///
/// # Errors
///
/// Propagates persistence errors.
pub fn create_side_effects(conn: &Connection, branch: Branch, log_id: LogId) -> Result<usize> {
    let mut queue: VecDeque<LogRecord> = LogRepo::records_for_log(conn, branch, log_id)?.into();
    let mut processed: HashSet<_> = queue.iter().map(|r| r.entity_id).collect();
    let mut recorded = 0;

    while let Some(cause) = queue.pop_front() {
        for dependent in BranchRepo::dependents(conn, branch, cause.entity_id)? {
            if dependent.entity_id == cause.entity_id {
                continue;
            }
            let effect = match LogRepo::find_record(conn, branch, log_id, dependent.entity_id)? {
                Some(existing) => existing,
                None => LogRepo::insert_record(
                    conn,
                    branch,
                    log_id,
                    dependent.entity_id,
                    dependent.version_id,
                    dependent.version_id,
                )?,
            };
            BranchRepo::set_log_record(conn, branch, dependent.entity_id, Some(effect.id))?;
            LogRepo::insert_side_effect(
                conn,
                branch,
                SideEffect {
                    cause_id: cause.id,
                    effect_id: effect.id,
                },
            )?;
            recorded += 1;

            if processed.insert(effect.entity_id) {
                queue.push_back(effect);
            }
        }
    }

    tracing::debug!(log_id, branch = %branch, side_effects = recorded, "side effects created");
    Ok(recorded)
}

/// Side effects caused by records of the log, in creation order.
///
/// # Errors
///
/// Propagates persistence errors.
pub fn side_effects_for_log(conn: &Connection, branch: Branch, log_id: LogId) -> Result<Vec<SideEffect>> {
    LogRepo::side_effects_for_log(conn, branch, log_id)
}
