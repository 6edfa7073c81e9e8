//! Publish command

use clap::Args;
use rusqlite::Connection;
use vellum_core::model::EntityId;
use vellum_engine::commands::entities::get_entity_by_key;
use vellum_engine::commands::packages::get_package_by_key;
use vellum_engine::commands::publishing::{
    publish_all_drafts, publish_from_drafts, publish_log_records, PublishOptions,
};
use vellum_engine::ObserverRegistry;

use super::CliResult;

#[derive(Debug, Args)]
pub struct PublishArgs {
    #[arg(long)]
    pub package: String,

    /// Entity key to publish; repeatable. Publishes every draft when omitted.
    #[arg(long = "entity")]
    pub entities: Vec<String>,

    #[arg(long, default_value = "")]
    pub message: String,

    /// Recorded as the publishing actor
    #[arg(long)]
    pub by: Option<String>,

    /// Publish only the named entities, not their unpinned children
    #[arg(long)]
    pub no_dependencies: bool,
}

pub fn execute(args: PublishArgs, conn: &Connection) -> CliResult {
    let package = get_package_by_key(conn, &args.package)?;
    let options = PublishOptions {
        message: args.message,
        published_at: None,
        published_by: args.by,
        publish_dependencies: !args.no_dependencies,
    };
    let observers = ObserverRegistry::new();

    let log = if args.entities.is_empty() {
        publish_all_drafts(conn, package.id, &options, &observers)?
    } else {
        let ids = args
            .entities
            .iter()
            .map(|key| get_entity_by_key(conn, package.id, key).map(|e| e.id))
            .collect::<Result<Vec<EntityId>, _>>()?;
        publish_from_drafts(conn, package.id, &ids, &options, &observers)?
    };

    match log {
        Some(log) => {
            let records = publish_log_records(conn, log.id)?;
            println!("Published log {} ({} records)", log.id, records.len());
        }
        None => println!("Nothing to publish"),
    }
    Ok(())
}
