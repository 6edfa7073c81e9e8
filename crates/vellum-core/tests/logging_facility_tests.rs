#![allow(clippy::unwrap_used, clippy::expect_used)]

use vellum_core::errors::{ExError, ExErrorKind, VellumError};
use vellum_core::logging_facility::test_capture::init_test_capture;
use vellum_core::{log_op_end, log_op_error, log_op_start};
use vellum_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "logging_test_start_1";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "logging_test_end_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "logging_test_error_3";

    let err = VellumError::EntityNotFound { entity_id: 1 };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events_for_op(op_name);
    let error_event = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("error event");
    assert_eq!(error_event.field("err.code"), Some("ERR_NOT_FOUND"));
    assert_eq!(error_event.field("err.kind"), Some("NotFound"));
}

#[test]
fn test_extra_fields_are_recorded() {
    let capture = init_test_capture();
    let op_name = "logging_test_fields_4";

    log_op_start!(op_name, package_id = 7, branch = "draft");

    let events = capture.events_for_op(op_name);
    assert_eq!(events[0].field("package_id"), Some("7"));
    assert_eq!(events[0].field("branch"), Some("draft"));
}

#[test]
fn test_start_and_end_are_paired() {
    let capture = init_test_capture();
    let op_name = "logging_test_pair_5";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 1, record_count = 3);

    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END)
    });
    assert_eq!(starts, 1);
    assert_eq!(ends, 1);
}

#[test]
fn test_error_macro_accepts_ex_error() {
    let capture = init_test_capture();
    let op_name = "logging_test_ex_error_6";

    let err = ExError::new(ExErrorKind::VersionConflict).with_entity_id(3);
    log_op_error!(op_name, err.clone(), duration_ms = 2, entity_id = 3);

    let events = capture.events_for_op(op_name);
    assert_eq!(events[0].field("err.code"), Some("ERR_VERSION_CONFLICT"));
    assert_eq!(events[0].field("entity_id"), Some("3"));
    assert!(err.is_retryable());
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_assert_event_exists_fails_for_unknown_op() {
    let capture = init_test_capture();
    capture.assert_event_exists("logging_test_never_emitted_999", EVENT_START);
}
