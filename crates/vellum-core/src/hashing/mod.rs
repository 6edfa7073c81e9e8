//! Dependency hash digests over the version/dependency graph.
//!
//! A log record's digest summarises the live state of everything its new
//! version depends on, transitively, on one branch. Comparing the draft and
//! published digests of an entity answers "did anything below this change"
//! without walking the child tree.
//!
//! The graph is a DAG in practice but nothing enforces it, so recursion
//! tracks in-progress records and reports a cycle instead of overflowing.
//!
//! ## Trust boundary
//!
//! Callers pass the set of *untrusted* record ids explicitly:
//!
//! - incremental mode: the records of the log being written; every other
//!   record keeps its stored digest
//! - backfill mode: every current record of the branch
//!
//! Memoisation is an explicit [`DigestMemo`] so a dependency shared by many
//! parents is hashed once per operation.

pub mod digest;

use std::collections::{HashMap, HashSet};

use crate::errors::{ExError, VellumError};
use crate::model::{EntityId, RecordId, VersionId};

pub use digest::{digest_summary, summarize_dependencies, DIGEST_BYTES};

/// A dependency entity that currently has a version on the branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDependency {
    pub entity_id: EntityId,
    /// The dependency's current branch version.
    pub version_id: VersionId,
    /// Branch pointer's log record, whose digest describes the dependency's own subtree.
    pub record_id: Option<RecordId>,
}

/// Read access to log records of one branch.
pub trait RecordGraph {
    /// New version of the record; `None` for a soft delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn new_version(&self, record: RecordId) -> Result<Option<VersionId>, ExError>;

    /// Dependencies of the record's new version that are live on the branch.
    /// Soft-deleted dependencies are excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the dependencies cannot be read.
    fn live_dependencies(&self, record: RecordId) -> Result<Vec<LiveDependency>, ExError>;

    /// Digest already persisted on the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn stored_digest(&self, record: RecordId) -> Result<String, ExError>;
}

/// Per-operation memo table keyed by record id.
#[derive(Debug, Default)]
pub struct DigestMemo {
    digests: HashMap<RecordId, String>,
    in_progress: HashSet<RecordId>,
}

impl DigestMemo {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn get(&self, record: RecordId) -> Option<&str> {
        self.digests.get(&record).map(String::as_str)
    }
}

/// Digest for one log record.
///
/// - memo hit: the memoised value
/// - record outside `untrusted`: its stored digest
/// - soft delete, or no live dependencies: empty string
/// - otherwise: [`summarize_dependencies`] over each live dependency's
///   branch version id and recursively resolved digest
///
/// # Errors
///
/// Propagates graph read errors, and returns `CycleDetected` if the record
/// is reached again while its own digest is being computed.
pub fn hash_for_record<G>(
    graph: &G,
    record: RecordId,
    memo: &mut DigestMemo,
    untrusted: &HashSet<RecordId>,
) -> Result<String, ExError>
where
    G: RecordGraph + ?Sized,
{
    if let Some(digest) = memo.digests.get(&record) {
        return Ok(digest.clone());
    }
    if !untrusted.contains(&record) {
        return graph.stored_digest(record);
    }
    if !memo.in_progress.insert(record) {
        return Err(VellumError::DependencyCycle { record_id: record }.into());
    }

    let digest = compute(graph, record, memo, untrusted);
    memo.in_progress.remove(&record);
    let digest = digest?;
    memo.digests.insert(record, digest.clone());
    Ok(digest)
}

fn compute<G>(
    graph: &G,
    record: RecordId,
    memo: &mut DigestMemo,
    untrusted: &HashSet<RecordId>,
) -> Result<String, ExError>
where
    G: RecordGraph + ?Sized,
{
    if graph.new_version(record)?.is_none() {
        return Ok(String::new());
    }
    let deps = graph.live_dependencies(record)?;
    if deps.is_empty() {
        return Ok(String::new());
    }

    let mut entries = Vec::with_capacity(deps.len());
    for dep in deps {
        let digest = match dep.record_id {
            Some(dep_record) => hash_for_record(graph, dep_record, memo, untrusted)?,
            None => String::new(),
        };
        entries.push((dep.version_id, digest));
    }
    Ok(summarize_dependencies(&mut entries))
}

/// Digests for every record in `records`, treating exactly those records as
/// untrusted.
///
/// # Errors
///
/// See [`hash_for_record`].
pub fn compute_digests<G>(
    graph: &G,
    records: &[RecordId],
) -> Result<Vec<(RecordId, String)>, ExError>
where
    G: RecordGraph + ?Sized,
{
    let untrusted: HashSet<RecordId> = records.iter().copied().collect();
    let mut memo = DigestMemo::new();
    records
        .iter()
        .map(|&record| Ok((record, hash_for_record(graph, record, &mut memo, &untrusted)?)))
        .collect()
}
