//! Package commands

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vellum_core::errors::{ExError, VellumError};
use vellum_core::model::{Package, PackageId};
use vellum_core::rules::{validate_key, validate_title};
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_store::db::atomic;
use vellum_store::repo::{PackageChanges, PackageRepo};
use vellum_store::Result;

use super::{elapsed_ms, require_package};

/// Field changes for [`update_package`]. All `None` changes nothing but
/// still stamps `updated`.
#[derive(Debug, Clone, Default)]
pub struct PackageUpdate {
    pub key: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Defaults to now.
    pub updated: Option<DateTime<Utc>>,
}

/// Create a package. Keys are unique across the store.
///
/// # Errors
///
/// `InvalidKey`/`InvalidTitle` for malformed input, `AlreadyExists` if the
/// key is taken.
pub fn create_package(
    conn: &Connection,
    key: &str,
    title: &str,
    description: &str,
    created: DateTime<Utc>,
) -> Result<Package> {
    log_op_start!("create_package", key = key);
    let start = std::time::Instant::now();

    let result = create_package_impl(conn, key, title, description, created).map_err(|e| {
        log_op_error!("create_package", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "create_package",
        duration_ms = elapsed_ms(start),
        package_id = result.id
    );
    Ok(result)
}

fn create_package_impl(
    conn: &Connection,
    key: &str,
    title: &str,
    description: &str,
    created: DateTime<Utc>,
) -> Result<Package> {
    validate_key(key).map_err(|e| ExError::from(e).with_op("create_package"))?;
    validate_title(title, false).map_err(|e| ExError::from(e).with_op("create_package"))?;

    atomic(conn, |conn| {
        if PackageRepo::exists(conn, key)? {
            return Err(ExError::from(VellumError::PackageAlreadyExists {
                key: key.to_string(),
            })
            .with_op("create_package"));
        }
        PackageRepo::insert(conn, key, title, description, created)
    })
}

/// # Errors
///
/// `NotFound` if no package has this id.
pub fn get_package(conn: &Connection, package_id: PackageId) -> Result<Package> {
    require_package(conn, "get_package", package_id)
}

/// # Errors
///
/// `NotFound` if no package has this key.
pub fn get_package_by_key(conn: &Connection, key: &str) -> Result<Package> {
    PackageRepo::get_by_key(conn, key)?.ok_or_else(|| {
        ExError::from(VellumError::PackageKeyNotFound {
            key: key.to_string(),
        })
        .with_op("get_package_by_key")
    })
}

/// # Errors
///
/// Propagates persistence errors.
pub fn package_exists(conn: &Connection, key: &str) -> Result<bool> {
    PackageRepo::exists(conn, key)
}

/// # Errors
///
/// Propagates persistence errors.
pub fn list_packages(conn: &Connection) -> Result<Vec<Package>> {
    PackageRepo::list(conn)
}

/// Update a package's key, title or description.
///
/// # Errors
///
/// `NotFound` for an unknown package, validation errors for a malformed new
/// key or title, `AlreadyExists` if the new key is taken.
pub fn update_package(conn: &Connection, package_id: PackageId, update: PackageUpdate) -> Result<Package> {
    if let Some(key) = &update.key {
        validate_key(key).map_err(|e| ExError::from(e).with_op("update_package"))?;
    }
    if let Some(title) = &update.title {
        validate_title(title, false).map_err(|e| ExError::from(e).with_op("update_package"))?;
    }

    atomic(conn, |conn| {
        let current = require_package(conn, "update_package", package_id)?;
        if let Some(key) = update.key.as_deref().filter(|k| *k != current.key) {
            if PackageRepo::exists(conn, key)? {
                return Err(ExError::from(VellumError::PackageAlreadyExists {
                    key: key.to_string(),
                })
                .with_op("update_package"));
            }
        }
        let changes = PackageChanges {
            key: update.key.clone(),
            title: update.title.clone(),
            description: update.description.clone(),
        };
        PackageRepo::update(conn, package_id, &changes, update.updated.unwrap_or_else(Utc::now))?;
        require_package(conn, "update_package", package_id)
    })
}

/// Remove a package and everything it owns. This is the only hard delete.
///
/// # Errors
///
/// `NotFound` for an unknown package.
pub fn delete_package(conn: &Connection, package_id: PackageId) -> Result<()> {
    log_op_start!("delete_package", package_id = package_id);
    let start = std::time::Instant::now();

    atomic(conn, |conn| {
        require_package(conn, "delete_package", package_id)?;
        PackageRepo::delete(conn, package_id)?;
        Ok(())
    })
    .map_err(|e| {
        log_op_error!("delete_package", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!("delete_package", duration_ms = elapsed_ms(start));
    Ok(())
}
