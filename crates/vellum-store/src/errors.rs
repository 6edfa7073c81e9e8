//! Error handling for vellum-store
//!
//! Wraps vellum-core ExError with store-specific helpers

use rusqlite::ErrorCode;
use vellum_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ConstraintViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// True if the error is a UNIQUE or PRIMARY KEY violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Create a database error from rusqlite::Error
///
/// Constraint failures map to `ConstraintViolation`, lock contention to
/// `Concurrency`, everything else to `Persistence`.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::ConstraintViolation => ExErrorKind::ConstraintViolation,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => ExErrorKind::Concurrency,
            _ => ExErrorKind::Persistence,
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => ExErrorKind::Serialization,
        _ => ExErrorKind::Persistence,
    };
    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a not-found error for a row that must exist.
pub fn missing_row(op: &str, what: &str, id: i64) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op(op.to_string())
        .with_message(format!("{} {} not found", what, id))
}
