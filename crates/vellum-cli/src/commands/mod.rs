pub mod backfill;
pub mod children;
pub mod log;
pub mod migrate;
pub mod package;
pub mod publish;
pub mod status;

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) type CliResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
