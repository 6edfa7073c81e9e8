//! Vellum CLI
//!
//! Command-line interface for a Vellum store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vellum_core::logging_facility;
use vellum_core::ExError;
use vellum_core_types::{RequestContext, TraceId};
use vellum_engine::EngineConfig;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "vellum")]
#[command(about = "Vellum - Versioned authoring store", long_about = None)]
struct Cli {
    /// Database file; overrides the config file and `VELLUM_DB`
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file; defaults to `vellum.toml` in the working directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Correlation id shared with the caller's own logs
    #[arg(long, global = true)]
    trace_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,
    /// Package operations
    Package(commands::package::PackageArgs),
    /// List entities with unpublished changes
    Status(commands::status::StatusArgs),
    /// Publish drafts
    Publish(commands::publish::PublishArgs),
    /// List publish logs
    Log(commands::log::LogArgs),
    /// List the children of a container
    Children(commands::children::ChildrenArgs),
    /// Recompute dependency digests
    Backfill(commands::backfill::BackfillArgs),
}

fn run(cli: Cli, ctx: &RequestContext) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    logging_facility::init(config.logging.profile);

    let span = tracing::info_span!(
        "request",
        request_id = %ctx.request_id,
        trace_id = ctx.trace_id.as_ref().map(TraceId::as_str)
    );
    let _guard = span.enter();

    let conn = config.open_connection()?;

    match cli.command {
        Commands::Migrate => commands::migrate::execute(&conn),
        Commands::Package(args) => commands::package::execute(args, &conn),
        Commands::Status(args) => commands::status::execute(args, &conn),
        Commands::Publish(args) => commands::publish::execute(args, &conn),
        Commands::Log(args) => commands::log::execute(args, &conn),
        Commands::Children(args) => commands::children::execute(args, &conn),
        Commands::Backfill(args) => commands::backfill::execute(args, &conn),
    }
}

fn main() {
    let cli = Cli::parse();
    let mut ctx = RequestContext::new();
    if let Some(trace_id) = &cli.trace_id {
        ctx = ctx.with_trace_id(TraceId::from_string(trace_id.as_str()));
    }

    if let Err(e) = run(cli, &ctx) {
        match e.downcast::<ExError>() {
            Ok(err) => eprintln!("Error: {}", (*err).with_context(&ctx)),
            Err(other) => eprintln!("Error: {}", other),
        }
        std::process::exit(1);
    }
}
