//! Domain model for packages, entities, versions, logs and containers.
//!
//! Every row is addressed by a surrogate integer id. Packages, entities,
//! versions and logs additionally carry a UUID that stays stable across
//! systems.

pub mod branch;
pub mod change_log;
pub mod component;
pub mod container;
pub mod entity;
pub mod package;

pub type PackageId = i64;
pub type EntityId = i64;
pub type VersionId = i64;
pub type LogId = i64;
pub type RecordId = i64;
pub type EntityListId = i64;

pub use branch::{Branch, BranchPointer};
pub use change_log::{DraftChangeLog, LogRecord, PublishLog, SideEffect};
pub use component::{Component, ComponentType, ContentEntry};
pub use container::{
    ChildEntry, ChildKind, ChildRef, ChildrenAction, Container, ContainerKind, ContainerSnapshot,
    ContainerVersion, EntityListRow,
};
pub use entity::{Entity, EntityVersion, NewVersion};
pub use package::Package;
