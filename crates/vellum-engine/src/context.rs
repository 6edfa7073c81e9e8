//! Active-log context
//!
//! A batch pushes its log onto a thread-local stack for the duration of the
//! batch. Code several frames below discovers the log for its package with
//! [`active_log`] instead of having a log handle threaded through every
//! call. Lookup scans from the top of the stack and matches on package, so
//! nested batches for different packages never attach a record to the
//! wrong log; with no match, the caller starts a fresh log of its own.
//!
//! The stack is per thread. Two unrelated operations on different threads
//! never see each other's logs.

use std::cell::RefCell;
use vellum_core::model::{Branch, LogId, PackageId};

/// One open batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLog {
    pub branch: Branch,
    pub log_id: LogId,
    pub package_id: PackageId,
}

thread_local! {
    static ACTIVE_LOGS: RefCell<Vec<ActiveLog>> = const { RefCell::new(Vec::new()) };
}

/// Innermost open batch of `branch` for `package_id` on this thread.
pub fn active_log(branch: Branch, package_id: PackageId) -> Option<ActiveLog> {
    ACTIVE_LOGS.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|log| log.branch == branch && log.package_id == package_id)
            .copied()
    })
}

/// Number of open batches on this thread.
pub fn depth() -> usize {
    ACTIVE_LOGS.with(|stack| stack.borrow().len())
}

/// Keeps a log on the stack until dropped, including on early return or
/// unwinding.
#[must_use = "the log leaves the stack when the scope is dropped"]
pub(crate) struct LogScope {
    entry: ActiveLog,
}

impl LogScope {
    pub(crate) fn enter(entry: ActiveLog) -> Self {
        ACTIVE_LOGS.with(|stack| stack.borrow_mut().push(entry));
        Self { entry }
    }
}

impl Drop for LogScope {
    fn drop(&mut self) {
        ACTIVE_LOGS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|log| *log == self.entry) {
                stack.remove(pos);
            }
        });
    }
}
