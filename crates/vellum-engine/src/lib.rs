//! Vellum Engine - Orchestration layer
//!
//! Coordinates the core domain rules with the SQLite store: draft change
//! batches, side-effect propagation, dependency digests, publishing,
//! containers, components and snapshot reads. Every public command takes a
//! borrowed `rusqlite::Connection` and runs inside `vellum_store::db::atomic`.

pub mod commands;
pub mod config;
pub mod context;
pub mod observers;

pub use config::EngineConfig;
pub use observers::{ObserverRegistry, PublishObserver};
