//! Schema migration command

use rusqlite::Connection;
use vellum_store::migrations::applied_migrations;

use super::CliResult;

/// The connection is migrated when it is opened; this reports the result.
pub fn execute(conn: &Connection) -> CliResult {
    let applied = applied_migrations(conn)?;
    for id in &applied {
        println!("{}", id);
    }
    println!("Schema up to date ({} migrations)", applied.len());
    Ok(())
}
