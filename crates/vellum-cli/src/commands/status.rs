//! Unpublished changes of a package

use std::collections::HashSet;

use clap::Args;
use rusqlite::Connection;
use vellum_core::model::EntityId;
use vellum_engine::commands::containers::list_containers;
use vellum_engine::commands::drafts::{
    get_entities_with_unpublished_changes, get_entities_with_unpublished_deletes,
};
use vellum_engine::commands::packages::get_package_by_key;
use vellum_engine::commands::publishing::contains_unpublished_changes;

use super::CliResult;

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub package: String,

    /// Also list containers whose own draft is published but whose
    /// children changed
    #[arg(long)]
    pub deep: bool,
}

pub fn execute(args: StatusArgs, conn: &Connection) -> CliResult {
    let package = get_package_by_key(conn, &args.package)?;
    let changed = get_entities_with_unpublished_changes(conn, package.id, true)?;
    let deleted: HashSet<EntityId> = get_entities_with_unpublished_deletes(conn, package.id)?
        .into_iter()
        .map(|e| e.id)
        .collect();

    let mut lines = 0;
    for entity in &changed {
        let state = if deleted.contains(&entity.id) {
            "deleted"
        } else {
            "changed"
        };
        println!("{}\t{}", state, entity.key);
        lines += 1;
    }

    if args.deep {
        let shallow: HashSet<EntityId> = changed.iter().map(|e| e.id).collect();
        for container in list_containers(conn, package.id, None, false)? {
            let id = container.entity.id;
            if !shallow.contains(&id) && contains_unpublished_changes(conn, id)? {
                println!("contains\t{}", container.entity.key);
                lines += 1;
            }
        }
    }

    if lines == 0 {
        println!("No unpublished changes");
    }
    Ok(())
}
