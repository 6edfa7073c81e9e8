//! Publish history

use clap::Args;
use rusqlite::Connection;
use vellum_engine::commands::packages::get_package_by_key;
use vellum_engine::commands::publishing::{list_publish_logs, publish_log_records};

use super::{format_time, CliResult};

#[derive(Debug, Args)]
pub struct LogArgs {
    #[arg(long)]
    pub package: String,
}

pub fn execute(args: LogArgs, conn: &Connection) -> CliResult {
    let package = get_package_by_key(conn, &args.package)?;
    let logs = list_publish_logs(conn, package.id)?;
    if logs.is_empty() {
        println!("No publishes");
        return Ok(());
    }
    for log in logs {
        let records = publish_log_records(conn, log.id)?;
        println!(
            "{}\t{}\t{}\t{}\t{}",
            log.id,
            format_time(&log.published_at),
            log.published_by.as_deref().unwrap_or("-"),
            records.len(),
            log.message
        );
    }
    Ok(())
}
