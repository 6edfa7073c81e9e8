// Lifecycle logging emitted by engine entry points.

mod common;

use common::{entity_with_version, package, setup_db, ts};
use vellum_core::logging_facility::test_capture::init_test_capture;
use vellum_core::model::NewVersion;
use vellum_engine::commands::entities::create_version;
use vellum_engine::commands::publishing::{publish_all_drafts, PublishOptions};
use vellum_engine::ObserverRegistry;

#[test]
fn test_publish_logs_start_and_end() {
    let capture = init_test_capture();
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "logging-publish");
    entity_with_version(&conn, &pkg, "intro");

    let log = publish_all_drafts(&conn, pkg.id, &PublishOptions::default(), &ObserverRegistry::new())
        .unwrap()
        .unwrap();

    capture.assert_event_exists("publish", "start");
    let log_id = log.id.to_string();
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some("publish")
            && e.event.as_deref() == Some("end")
            && e.field("log_id") == Some(log_id.as_str())
    });
    assert!(ends >= 1);
}

#[test]
fn test_failed_version_logs_end_error() {
    let capture = init_test_capture();
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "logging-conflict");
    let (entity, _) = entity_with_version(&conn, &pkg, "intro");

    let result = create_version(&conn, entity.id, NewVersion::new(7, "skip", ts(5)));
    assert!(result.is_err());

    let entity_id = entity.id.to_string();
    let errors = capture.count_events(|e| {
        e.op.as_deref() == Some("create_version")
            && e.event.as_deref() == Some("end_error")
            && e.field("err.code") == Some("ERR_VERSION_CONFLICT")
    });
    assert!(errors >= 1, "no end_error event for entity {}", entity_id);
}
