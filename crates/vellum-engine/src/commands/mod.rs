//! Command orchestration layer.
//!
//! The engine layer owns lifecycle logging for its entry points:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (store, core) use only `tracing::debug!()` for internal details.

#![allow(clippy::result_large_err)]

pub mod components;
pub mod containers;
pub mod dependency_hash;
pub mod drafts;
pub mod entities;
pub mod packages;
pub mod publishing;
pub mod side_effects;
pub mod snapshot;

use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{Entity, EntityId, EntityVersion, Package, PackageId, VersionId};
use vellum_store::repo::{EntityRepo, PackageRepo};
use vellum_store::Result;

pub(crate) fn require_package(conn: &Connection, op: &str, package_id: PackageId) -> Result<Package> {
    PackageRepo::get(conn, package_id)?
        .ok_or_else(|| ExError::from(VellumError::PackageNotFound { package_id }).with_op(op))
}

pub(crate) fn require_entity(conn: &Connection, op: &str, entity_id: EntityId) -> Result<Entity> {
    EntityRepo::get(conn, entity_id)?
        .ok_or_else(|| ExError::from(VellumError::EntityNotFound { entity_id }).with_op(op))
}

pub(crate) fn require_version(conn: &Connection, op: &str, version_id: VersionId) -> Result<EntityVersion> {
    EntityRepo::get_version(conn, version_id)?
        .ok_or_else(|| ExError::from(VellumError::VersionNotFound { version_id }).with_op(op))
}

pub(crate) fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
