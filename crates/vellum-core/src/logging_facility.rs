//! Structured logging facility
//!
//! - Single initialization point via `init(profile)`
//! - Operation macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use vellum_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Engine entry points (publish, draft batches, container versioning,
//! backfill) emit one start event and one end or end_error event each,
//! carrying `component`, `op`, `event` and `duration_ms`.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
