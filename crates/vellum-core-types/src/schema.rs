//! Canonical field keys and event names for structured logging.

// Operation envelope
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Publishing identifiers
pub const FIELD_PACKAGE_ID: &str = "package_id";
pub const FIELD_ENTITY_ID: &str = "entity_id";
pub const FIELD_VERSION_ID: &str = "version_id";
pub const FIELD_LOG_ID: &str = "log_id";
pub const FIELD_BRANCH: &str = "branch";

// Batch sizes
pub const FIELD_RECORD_COUNT: &str = "record_count";
pub const FIELD_SIDE_EFFECT_COUNT: &str = "side_effect_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
