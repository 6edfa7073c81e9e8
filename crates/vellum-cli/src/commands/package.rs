//! Package commands

use chrono::Utc;
use clap::{Args, Subcommand};
use rusqlite::Connection;
use vellum_engine::commands::drafts::{get_all_drafts, get_entities_with_unpublished_changes};
use vellum_engine::commands::entities::list_entities;
use vellum_engine::commands::packages::{create_package, get_package_by_key};
use vellum_engine::commands::publishing::get_last_publish;

use super::{format_time, CliResult};

#[derive(Debug, Args)]
pub struct PackageArgs {
    #[command(subcommand)]
    pub command: PackageCommand,
}

#[derive(Debug, Subcommand)]
pub enum PackageCommand {
    /// Create a package
    Create(CreateArgs),
    /// Show a package and its publishing state
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub key: String,

    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub key: String,
}

pub fn execute(args: PackageArgs, conn: &Connection) -> CliResult {
    match args.command {
        PackageCommand::Create(create_args) => execute_create(create_args, conn),
        PackageCommand::Show(show_args) => execute_show(show_args, conn),
    }
}

fn execute_create(args: CreateArgs, conn: &Connection) -> CliResult {
    let package = create_package(conn, &args.key, &args.title, &args.description, Utc::now())?;
    println!("Created package {} ({})", package.key, package.uuid);
    Ok(())
}

fn execute_show(args: ShowArgs, conn: &Connection) -> CliResult {
    let package = get_package_by_key(conn, &args.key)?;
    let entities = list_entities(conn, package.id)?;
    let drafts = get_all_drafts(conn, package.id)?;
    let live_drafts = drafts.iter().filter(|d| d.is_live()).count();
    let unpublished = get_entities_with_unpublished_changes(conn, package.id, true)?;

    println!("Key:         {}", package.key);
    println!("UUID:        {}", package.uuid);
    println!("Title:       {}", package.title);
    if !package.description.is_empty() {
        println!("Description: {}", package.description);
    }
    println!("Created:     {}", format_time(&package.created));
    println!("Updated:     {}", format_time(&package.updated));
    println!("Entities:    {}", entities.len());
    println!("Drafts:      {}", live_drafts);
    println!("Unpublished: {}", unpublished.len());
    match get_last_publish(conn, package.id)? {
        Some(log) => println!("Last publish: log {} at {}", log.id, format_time(&log.published_at)),
        None => println!("Last publish: never"),
    }
    Ok(())
}
