//! Publish observers
//!
//! Subsystems that keep their own records in step with publishing register
//! a [`PublishObserver`] at startup. Observers run synchronously, inside the
//! publish transaction, immediately before it commits: whatever they write
//! through the connection commits or rolls back together with the publish.
//!
//! The publish is not durable while an observer runs. Observers must not
//! schedule deferred or asynchronous work from here; anything they hand off
//! could act on a publish that is about to be rolled back.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use std::sync::Arc;
use vellum_core::model::PublishLog;
use vellum_store::Result;

/// Hook fired once per publish, before commit.
pub trait PublishObserver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Called with the open transaction's connection and the new log.
    ///
    /// # Errors
    ///
    /// Any error aborts and rolls back the whole publish.
    fn on_publish_pre_commit(&self, conn: &Connection, log: &PublishLog) -> Result<()>;
}

/// Ordered list of observers, fixed once publishing starts.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn PublishObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn PublishObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run every observer in registration order; stops at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first observer error.
    pub fn notify_pre_commit(&self, conn: &Connection, log: &PublishLog) -> Result<()> {
        for observer in &self.observers {
            tracing::debug!(observer = observer.name(), log_id = log.id, "publish observer");
            observer.on_publish_pre_commit(conn, log)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|o| o.name()))
            .finish()
    }
}
