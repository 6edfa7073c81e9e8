//! Repository layer for persisting domain models to SQLite
//!
//! One unit struct per table family, each a set of associated functions
//! over a borrowed `Connection`. Repositories never open transactions;
//! callers compose them inside [`crate::db::atomic`].

pub mod branches;
pub mod change_logs;
pub mod components;
pub mod containers;
pub mod entities;
pub mod entity_lists;
pub mod packages;
pub mod record_graph;
mod rows;

pub use branches::BranchRepo;
pub use change_logs::LogRepo;
pub use components::ComponentRepo;
pub use containers::ContainerRepo;
pub use entities::EntityRepo;
pub use entity_lists::EntityListRepo;
pub use packages::{PackageChanges, PackageRepo};
pub use record_graph::SqlRecordGraph;

use vellum_core::model::Branch;

/// Table names of one branch. Draft and published tables share column
/// layouts, so branch-generic SQL only swaps these.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BranchTables {
    pub logs: &'static str,
    pub records: &'static str,
    pub pointers: &'static str,
    pub side_effects: &'static str,
}

pub(crate) fn tables(branch: Branch) -> BranchTables {
    match branch {
        Branch::Draft => BranchTables {
            logs: "draft_change_logs",
            records: "draft_change_log_records",
            pointers: "drafts",
            side_effects: "draft_side_effects",
        },
        Branch::Published => BranchTables {
            logs: "publish_logs",
            records: "publish_log_records",
            pointers: "published",
            side_effects: "publish_side_effects",
        },
    }
}
