//! Vellum Store - SQLite persistence for the publishing engine
//!
//! Provides:
//! - Connection setup and the `atomic` transaction helper
//! - Embedded, checksummed schema migrations
//! - Repositories for packages, entities, versions, branch pointers,
//!   change logs, entity lists, containers and components
//! - [`repo::SqlRecordGraph`], the SQL-backed input to the dependency hash

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
