// Integration tests for entity and version creation.
// Covers key validation, version numbering and racing writers.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{entity_with_version, open_at, package, setup_db, ts};
use vellum_core::model::NewVersion;
use vellum_core::ExErrorKind;
use vellum_engine::commands::drafts::get_draft;
use vellum_engine::commands::entities::{
    create_entity, create_version, get_entity_by_key, get_entity_by_uuid, get_latest_version, get_version_by_uuid,
    list_versions, version_dependencies,
};

// ---------------------------------------------------------------------------
// create_entity
// ---------------------------------------------------------------------------

#[test]
fn test_create_entity_and_lookup_by_key() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");

    let entity = create_entity(&conn, pkg.id, "intro", ts(1), Some("ada"), true).unwrap();

    let by_key = get_entity_by_key(&conn, pkg.id, "intro").unwrap();
    assert_eq!(by_key, entity);
    let by_uuid = get_entity_by_uuid(&conn, &entity.uuid).unwrap();
    assert_eq!(by_uuid.id, entity.id);
    assert_eq!(by_uuid.created_by.as_deref(), Some("ada"));
}

#[test]
fn test_create_entity_rejects_duplicate_key() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    create_entity(&conn, pkg.id, "intro", ts(1), None, true).unwrap();

    let err = create_entity(&conn, pkg.id, "intro", ts(2), None, true).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
}

#[test]
fn test_same_key_allowed_in_other_package() {
    let (_tmp, conn) = setup_db();
    let a = package(&conn, "course-a");
    let b = package(&conn, "course-b");
    create_entity(&conn, a.id, "intro", ts(1), None, true).unwrap();
    assert!(create_entity(&conn, b.id, "intro", ts(1), None, true).is_ok());
}

#[test]
fn test_create_entity_rejects_blank_key() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");

    let err = create_entity(&conn, pkg.id, "   ", ts(1), None, true).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidKey);
}

#[test]
fn test_get_entity_by_key_missing() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");

    let err = get_entity_by_key(&conn, pkg.id, "nope").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// create_version
// ---------------------------------------------------------------------------

#[test]
fn test_create_version_sets_draft() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (entity, v1) = entity_with_version(&conn, &pkg, "intro");

    assert_eq!(v1.version_num, 1);
    assert_eq!(get_draft(&conn, entity.id).unwrap(), Some(v1.clone()));

    let v2 = create_version(&conn, entity.id, NewVersion::new(2, "Intro v2", ts(3))).unwrap();
    assert_eq!(get_draft(&conn, entity.id).unwrap().unwrap().id, v2.id);
    assert_eq!(get_latest_version(&conn, entity.id).unwrap().unwrap().id, v2.id);
    assert_eq!(get_version_by_uuid(&conn, &v2.uuid).unwrap().title, "Intro v2");
    assert_eq!(list_versions(&conn, entity.id).unwrap().len(), 2);
}

#[test]
fn test_create_version_skipping_a_number_conflicts() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (entity, _) = entity_with_version(&conn, &pkg, "intro");

    let err = create_version(&conn, entity.id, NewVersion::new(3, "skip", ts(3))).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::VersionConflict);
    assert!(err.is_retryable());
    assert_eq!(list_versions(&conn, entity.id).unwrap().len(), 1);
}

#[test]
fn test_create_version_repeating_a_number_conflicts() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (entity, _) = entity_with_version(&conn, &pkg, "intro");

    let err = create_version(&conn, entity.id, NewVersion::new(1, "again", ts(3))).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::VersionConflict);
}

#[test]
fn test_create_version_records_deduplicated_dependencies() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (dep, _) = entity_with_version(&conn, &pkg, "dep");
    let entity = create_entity(&conn, pkg.id, "parent", ts(1), None, true).unwrap();

    let version = create_version(
        &conn,
        entity.id,
        NewVersion::new(1, "parent", ts(2)).with_dependencies(vec![dep.id, dep.id]),
    )
    .unwrap();

    assert_eq!(version_dependencies(&conn, version.id).unwrap(), vec![dep.id]);
}

#[test]
fn test_create_version_rejects_dependency_in_other_package() {
    let (_tmp, conn) = setup_db();
    let a = package(&conn, "course-a");
    let b = package(&conn, "course-b");
    let (foreign, _) = entity_with_version(&conn, &b, "foreign");
    let entity = create_entity(&conn, a.id, "parent", ts(1), None, true).unwrap();

    let err = create_version(
        &conn,
        entity.id,
        NewVersion::new(1, "parent", ts(2)).with_dependencies(vec![foreign.id]),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::CrossPackageReference);
    assert!(get_draft(&conn, entity.id).unwrap().is_none());
}

#[test]
fn test_create_version_unknown_entity() {
    let (_tmp, conn) = setup_db();
    let err = create_version(&conn, 999, NewVersion::new(1, "x", ts(1))).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Racing writers
// ---------------------------------------------------------------------------

#[test]
fn test_racing_create_version_one_wins() {
    let (tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let entity = create_entity(&conn, pkg.id, "contended", ts(1), None, true).unwrap();
    let entity_id = entity.id;

    let tmp = Arc::new(tmp);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let tmp = Arc::clone(&tmp);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_at(&tmp);
                barrier.wait();
                create_version(&conn, entity_id, NewVersion::new(1, format!("writer {}", i), ts(10 + i)))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == ExErrorKind::VersionConflict))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(list_versions(&conn, entity.id).unwrap().len(), 1);

    // The loser retries against the freshly read latest version.
    let latest = get_latest_version(&conn, entity.id).unwrap().unwrap();
    let retry = create_version(
        &conn,
        entity.id,
        NewVersion::new(latest.version_num + 1, "retry", ts(20)),
    )
    .unwrap();
    assert_eq!(retry.version_num, 2);
}
