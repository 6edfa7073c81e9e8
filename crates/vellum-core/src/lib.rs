//! Vellum Core - domain model and pure algorithms of the publishing engine
//!
//! - Package, entity, version, log and container models
//! - The error facility (`ExError`, `ExErrorKind`) and domain errors
//! - Structured logging facility
//! - Key/title/child-list validation rules
//! - The dependency hash algorithm, independent of storage
//!
//! Nothing in this crate performs I/O; persistence lives in `vellum-store`
//! and orchestration in `vellum-engine`.

pub mod errors;
pub mod hashing;
pub mod logging_facility;
pub mod model;
pub mod rules;

#[doc(hidden)]
pub use vellum_core_types;

pub use errors::{ExError, ExErrorKind, Result, VellumError};
pub use model::{Branch, ChildRef, ContainerKind, EntityId, LogId, PackageId, RecordId, VersionId};
