//! Container children on a branch or as of a publish

use clap::Args;
use rusqlite::Connection;
use vellum_core::model::{Branch, ChildEntry, LogId};
use vellum_engine::commands::containers::entities_in_container;
use vellum_engine::commands::entities::{get_entity, get_entity_by_key, get_version};
use vellum_engine::commands::packages::get_package_by_key;
use vellum_engine::commands::snapshot::as_of;

use super::CliResult;

#[derive(Debug, Args)]
pub struct ChildrenArgs {
    #[arg(long)]
    pub package: String,

    /// Container entity key
    #[arg(long)]
    pub container: String,

    /// Read the published branch instead of drafts
    #[arg(long, conflicts_with = "as_of")]
    pub published: bool,

    /// Publish log id to read the container as of
    #[arg(long)]
    pub as_of: Option<LogId>,
}

pub fn execute(args: ChildrenArgs, conn: &Connection) -> CliResult {
    let package = get_package_by_key(conn, &args.package)?;
    let container = get_entity_by_key(conn, package.id, &args.container)?;

    let children = match args.as_of {
        Some(log_id) => match as_of(conn, container.id, log_id)? {
            Some(snapshot) => {
                println!(
                    "{} v{} as of log {}",
                    container.key, snapshot.container_version.version_num, log_id
                );
                snapshot.children
            }
            None => {
                println!("{} was not published as of log {}", container.key, log_id);
                return Ok(());
            }
        },
        None => {
            let branch = if args.published {
                Branch::Published
            } else {
                Branch::Draft
            };
            entities_in_container(conn, container.id, branch)?
        }
    };

    for child in &children {
        println!("{}", describe(conn, child)?);
    }
    Ok(())
}

fn describe(conn: &Connection, child: &ChildEntry) -> Result<String, Box<dyn std::error::Error>> {
    let entity = get_entity(conn, child.entity_id)?;
    let version = get_version(conn, child.version_id)?;
    let pin = if child.pinned { " (pinned)" } else { "" };
    Ok(format!("{}\tv{}{}", entity.key, version.version_num, pin))
}
