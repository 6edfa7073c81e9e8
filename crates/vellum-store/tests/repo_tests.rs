// Integration tests for the repository layer against a migrated database

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use rusqlite::Connection;
use vellum_core::errors::ExErrorKind;
use vellum_core::hashing::compute_digests;
use vellum_core::model::{Branch, BranchPointer, ChildRef, ContainerKind, NewVersion};
use vellum_store::repo::{
    BranchRepo, ContainerRepo, EntityListRepo, EntityRepo, LogRepo, PackageChanges, PackageRepo,
    SqlRecordGraph,
};

fn setup() -> Connection {
    let mut conn = vellum_store::db::open_in_memory().unwrap();
    vellum_store::db::configure(&conn, &vellum_store::db::DbOptions::default()).unwrap();
    vellum_store::migrations::apply_migrations(&mut conn).unwrap();
    conn
}

fn point(conn: &Connection, branch: Branch, entity_id: i64, version_id: Option<i64>, record: Option<i64>) {
    BranchRepo::upsert(
        conn,
        branch,
        &BranchPointer {
            entity_id,
            version_id,
            log_record_id: record,
        },
    )
    .unwrap();
}

#[test]
fn test_package_update_leaves_unset_fields_alone() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "desc", Utc::now()).unwrap();

    let changes = PackageChanges {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    assert!(PackageRepo::update(&conn, package.id, &changes, Utc::now()).unwrap());

    let reloaded = PackageRepo::get(&conn, package.id).unwrap().unwrap();
    assert_eq!(reloaded.key, "lib");
    assert_eq!(reloaded.title, "Renamed");
    assert_eq!(reloaded.description, "desc");
    assert_eq!(reloaded.uuid, package.uuid);
    assert!(PackageRepo::exists(&conn, "lib").unwrap());
    assert!(!PackageRepo::exists(&conn, "other").unwrap());
}

#[test]
fn test_duplicate_entity_key_is_already_exists() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    EntityRepo::insert(&conn, package.id, "a", Utc::now(), None, true).unwrap();

    let err = EntityRepo::insert(&conn, package.id, "a", Utc::now(), Some("ann"), true).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
}

#[test]
fn test_duplicate_version_number_is_version_conflict() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    let entity = EntityRepo::insert(&conn, package.id, "a", Utc::now(), None, true).unwrap();

    EntityRepo::insert_version(&conn, entity.id, &NewVersion::new(1, "one", Utc::now())).unwrap();
    let err = EntityRepo::insert_version(&conn, entity.id, &NewVersion::new(1, "again", Utc::now()))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::VersionConflict);
    assert!(err.is_retryable());
    assert_eq!(EntityRepo::latest_version_num(&conn, entity.id).unwrap(), 1);
}

#[test]
fn test_unpublished_change_queries() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    let changed = EntityRepo::insert(&conn, package.id, "changed", Utc::now(), None, true).unwrap();
    let same = EntityRepo::insert(&conn, package.id, "same", Utc::now(), None, true).unwrap();
    let deleted = EntityRepo::insert(&conn, package.id, "deleted", Utc::now(), None, true).unwrap();
    let gone = EntityRepo::insert(&conn, package.id, "gone", Utc::now(), None, true).unwrap();

    let v_changed_1 = EntityRepo::insert_version(&conn, changed.id, &NewVersion::new(1, "", Utc::now())).unwrap();
    let v_changed_2 = EntityRepo::insert_version(&conn, changed.id, &NewVersion::new(2, "", Utc::now())).unwrap();
    let v_same = EntityRepo::insert_version(&conn, same.id, &NewVersion::new(1, "", Utc::now())).unwrap();
    let v_deleted = EntityRepo::insert_version(&conn, deleted.id, &NewVersion::new(1, "", Utc::now())).unwrap();

    point(&conn, Branch::Draft, changed.id, Some(v_changed_2.id), None);
    point(&conn, Branch::Published, changed.id, Some(v_changed_1.id), None);
    point(&conn, Branch::Draft, same.id, Some(v_same.id), None);
    point(&conn, Branch::Published, same.id, Some(v_same.id), None);
    point(&conn, Branch::Draft, deleted.id, None, None);
    point(&conn, Branch::Published, deleted.id, Some(v_deleted.id), None);
    point(&conn, Branch::Draft, gone.id, None, None);

    let ids = |entities: Vec<vellum_core::model::Entity>| entities.into_iter().map(|e| e.id).collect::<Vec<_>>();

    assert_eq!(ids(BranchRepo::unpublished_changes(&conn, package.id, false).unwrap()), vec![changed.id]);
    assert_eq!(
        ids(BranchRepo::unpublished_changes(&conn, package.id, true).unwrap()),
        vec![changed.id, deleted.id]
    );
    assert_eq!(ids(BranchRepo::unpublished_deletes(&conn, package.id).unwrap()), vec![deleted.id]);
    assert_eq!(
        ids(BranchRepo::filter_entities(&conn, package.id, Some(false), Some(false)).unwrap()),
        vec![gone.id]
    );
    assert_eq!(
        BranchRepo::drafts_differing_from_published(&conn, package.id).unwrap(),
        vec![(changed.id, Some(v_changed_1.id)), (deleted.id, Some(v_deleted.id))]
    );
}

#[test]
fn test_containers_with_entity_respects_pins() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    let child = EntityRepo::insert(&conn, package.id, "child", Utc::now(), None, true).unwrap();
    let child_v1 = EntityRepo::insert_version(&conn, child.id, &NewVersion::new(1, "", Utc::now())).unwrap();

    let mut containers = Vec::new();
    for (key, pinned) in [("follows", false), ("pins", true)] {
        let entity = EntityRepo::insert(&conn, package.id, key, Utc::now(), None, true).unwrap();
        ContainerRepo::insert(&conn, entity.id, ContainerKind::Generic).unwrap();
        let version = EntityRepo::insert_version(&conn, entity.id, &NewVersion::new(1, key, Utc::now())).unwrap();
        let row = if pinned {
            ChildRef::pinned(child.id, child_v1.id)
        } else {
            ChildRef::unpinned(child.id)
        };
        let list = EntityListRepo::create(&conn, &[row]).unwrap();
        ContainerRepo::insert_version(&conn, version.id, entity.id, list).unwrap();
        point(&conn, Branch::Draft, entity.id, Some(version.id), None);
        containers.push(entity.id);
    }

    let all: Vec<_> = ContainerRepo::containers_with_entity(&conn, Branch::Draft, child.id, false)
        .unwrap()
        .into_iter()
        .map(|c| c.entity.id)
        .collect();
    assert_eq!(all, containers);

    let unpinned = ContainerRepo::containers_with_entity(&conn, Branch::Draft, child.id, true).unwrap();
    assert_eq!(unpinned.len(), 1);
    assert_eq!(unpinned[0].entity.key, "follows");

    assert!(ContainerRepo::containers_with_entity(&conn, Branch::Published, child.id, false)
        .unwrap()
        .is_empty());
}

#[test]
fn test_sql_record_graph_feeds_digest_computation() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    let leaf = EntityRepo::insert(&conn, package.id, "leaf", Utc::now(), None, true).unwrap();
    let parent = EntityRepo::insert(&conn, package.id, "parent", Utc::now(), None, true).unwrap();

    let leaf_v1 = EntityRepo::insert_version(&conn, leaf.id, &NewVersion::new(1, "", Utc::now())).unwrap();
    let parent_v1 = EntityRepo::insert_version(&conn, parent.id, &NewVersion::new(1, "", Utc::now())).unwrap();
    EntityRepo::insert_dependencies(&conn, parent_v1.id, &[leaf.id, leaf.id]).unwrap();
    assert_eq!(EntityRepo::dependencies(&conn, parent_v1.id).unwrap(), vec![leaf.id]);

    let log = LogRepo::create_draft_log(&conn, package.id, Utc::now(), None).unwrap();
    let leaf_rec = LogRepo::insert_record(&conn, Branch::Draft, log.id, leaf.id, None, Some(leaf_v1.id)).unwrap();
    let parent_rec =
        LogRepo::insert_record(&conn, Branch::Draft, log.id, parent.id, None, Some(parent_v1.id)).unwrap();
    point(&conn, Branch::Draft, leaf.id, Some(leaf_v1.id), Some(leaf_rec.id));
    point(&conn, Branch::Draft, parent.id, Some(parent_v1.id), Some(parent_rec.id));

    let graph = SqlRecordGraph::new(&conn, Branch::Draft);
    let digests = compute_digests(&graph, &[leaf_rec.id, parent_rec.id]).unwrap();

    assert_eq!(digests[0], (leaf_rec.id, String::new()));
    assert_eq!(digests[1].1.len(), 8);

    // Soft-deleting the only dependency empties the parent's digest.
    point(&conn, Branch::Draft, leaf.id, None, Some(leaf_rec.id));
    let digests = compute_digests(&graph, &[parent_rec.id]).unwrap();
    assert_eq!(digests[0].1, "");
}

#[test]
fn test_published_record_as_of_picks_latest_not_after_log() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    let entity = EntityRepo::insert(&conn, package.id, "a", Utc::now(), None, true).unwrap();
    let v1 = EntityRepo::insert_version(&conn, entity.id, &NewVersion::new(1, "", Utc::now())).unwrap();
    let v2 = EntityRepo::insert_version(&conn, entity.id, &NewVersion::new(2, "", Utc::now())).unwrap();

    let first = LogRepo::create_publish_log(&conn, package.id, "first", Utc::now(), None).unwrap();
    LogRepo::insert_record(&conn, Branch::Published, first.id, entity.id, None, Some(v1.id)).unwrap();
    let unrelated = LogRepo::create_publish_log(&conn, package.id, "other", Utc::now(), None).unwrap();
    let second = LogRepo::create_publish_log(&conn, package.id, "second", Utc::now(), None).unwrap();
    LogRepo::insert_record(&conn, Branch::Published, second.id, entity.id, Some(v1.id), Some(v2.id)).unwrap();

    let as_of = |log_id| {
        LogRepo::published_record_as_of(&conn, entity.id, log_id)
            .unwrap()
            .and_then(|r| r.new_version_id)
    };
    assert_eq!(as_of(first.id), Some(v1.id));
    assert_eq!(as_of(unrelated.id), Some(v1.id));
    assert_eq!(as_of(second.id), Some(v2.id));

    let logs = LogRepo::list_publish_logs(&conn, package.id).unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(LogRepo::last_publish_log(&conn, package.id).unwrap().unwrap().id, second.id);
}

#[test]
fn test_package_delete_cascades_to_everything_it_owns() {
    let conn = setup();
    let package = PackageRepo::insert(&conn, "lib", "Library", "", Utc::now()).unwrap();
    let entity = EntityRepo::insert(&conn, package.id, "a", Utc::now(), None, true).unwrap();
    let v1 = EntityRepo::insert_version(&conn, entity.id, &NewVersion::new(1, "", Utc::now())).unwrap();
    let log = LogRepo::create_draft_log(&conn, package.id, Utc::now(), None).unwrap();
    let rec = LogRepo::insert_record(&conn, Branch::Draft, log.id, entity.id, None, Some(v1.id)).unwrap();
    point(&conn, Branch::Draft, entity.id, Some(v1.id), Some(rec.id));

    assert!(PackageRepo::delete(&conn, package.id).unwrap());

    for table in ["entities", "entity_versions", "drafts", "draft_change_logs", "draft_change_log_records"] {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "{} not emptied", table);
    }
}
