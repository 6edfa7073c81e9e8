//! Dependency digest backfill

use clap::Args;
use rusqlite::Connection;
use vellum_core::model::Branch;
use vellum_engine::commands::dependency_hash::backfill_dependency_hashes;
use vellum_engine::commands::packages::get_package_by_key;

use super::CliResult;

#[derive(Debug, Args)]
pub struct BackfillArgs {
    #[arg(long)]
    pub package: String,

    /// draft | published
    #[arg(long, default_value = "draft")]
    pub branch: Branch,
}

pub fn execute(args: BackfillArgs, conn: &Connection) -> CliResult {
    let package = get_package_by_key(conn, &args.package)?;
    let updated = backfill_dependency_hashes(conn, package.id, args.branch)?;
    println!("Recomputed {} {} digests", updated, args.branch);
    Ok(())
}
