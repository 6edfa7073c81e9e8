// Integration tests for side effects and dependency digests.
// Covers deep vs shallow change detection, soft deletes, locality and backfill.

mod common;

use std::collections::BTreeMap;

use common::{component, container, package, setup_db, ts, unit};
use vellum_core::model::{Branch, ChildRef, ContainerKind};
use vellum_engine::commands::components::create_next_component_version;
use vellum_engine::commands::dependency_hash::{backfill_dependency_hashes, current_digest};
use vellum_engine::commands::drafts::{
    get_draft_change_log, has_unpublished_changes, list_draft_change_logs, soft_delete_draft,
};
use vellum_engine::commands::publishing::{
    contains_unpublished_changes, publish_all_drafts, publish_from_drafts, publish_log_records, PublishOptions,
};
use vellum_engine::commands::side_effects::side_effects_for_log;
use vellum_engine::ObserverRegistry;

fn publish_everything(conn: &rusqlite::Connection, package_id: i64) {
    publish_all_drafts(conn, package_id, &PublishOptions::default(), &ObserverRegistry::new()).unwrap();
}

fn replace_block(conn: &rusqlite::Connection, component_id: i64, digest: &str) {
    let mut changes = BTreeMap::new();
    changes.insert("block.xml".to_string(), Some(digest.to_string()));
    create_next_component_version(conn, component_id, &changes, None, ts(50), None).unwrap();
}

// ---------------------------------------------------------------------------
// Deep vs shallow
// ---------------------------------------------------------------------------

#[test]
fn test_child_edit_is_deep_but_not_shallow_change() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c1, _) = component(&conn, &pkg, "c1");
    let (u1, _) = unit(&conn, &pkg, "u1", &[ChildRef::unpinned(c1.entity.id)]);
    publish_everything(&conn, pkg.id);

    assert!(!has_unpublished_changes(&conn, u1.entity.id).unwrap());
    assert!(!contains_unpublished_changes(&conn, u1.entity.id).unwrap());

    replace_block(&conn, c1.entity.id, "c1-v2");

    assert!(!has_unpublished_changes(&conn, u1.entity.id).unwrap());
    assert!(contains_unpublished_changes(&conn, u1.entity.id).unwrap());

    // Publishing only the child brings the unit back in line.
    publish_from_drafts(
        &conn,
        pkg.id,
        &[c1.entity.id],
        &PublishOptions::default(),
        &ObserverRegistry::new(),
    )
    .unwrap();
    assert!(!contains_unpublished_changes(&conn, u1.entity.id).unwrap());
}

#[test]
fn test_never_published_entity_has_unpublished_changes() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c1, _) = component(&conn, &pkg, "c1");

    assert!(has_unpublished_changes(&conn, c1.entity.id).unwrap());
    assert!(contains_unpublished_changes(&conn, c1.entity.id).unwrap());
}

#[test]
fn test_shared_grandchild_flags_every_ancestor() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (shared, _) = component(&conn, &pkg, "shared");
    let (u1, _) = unit(&conn, &pkg, "u1", &[ChildRef::unpinned(shared.entity.id)]);
    let (u2, _) = unit(&conn, &pkg, "u2", &[ChildRef::unpinned(shared.entity.id)]);
    let (sub, _) = container(
        &conn,
        &pkg,
        "sub",
        ContainerKind::Subsection,
        &[ChildRef::unpinned(u1.entity.id)],
    );
    publish_everything(&conn, pkg.id);

    replace_block(&conn, shared.entity.id, "shared-v2");

    for id in [u1.entity.id, u2.entity.id, sub.entity.id] {
        assert!(!has_unpublished_changes(&conn, id).unwrap());
        assert!(contains_unpublished_changes(&conn, id).unwrap());
    }
}

// ---------------------------------------------------------------------------
// Side effects
// ---------------------------------------------------------------------------

#[test]
fn test_side_effects_propagate_layer_by_layer() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c, _) = component(&conn, &pkg, "c");
    let (u, _) = unit(&conn, &pkg, "u", &[ChildRef::unpinned(c.entity.id)]);
    let (sub, _) = container(&conn, &pkg, "sub", ContainerKind::Subsection, &[ChildRef::unpinned(u.entity.id)]);
    let (sec, _) = container(&conn, &pkg, "sec", ContainerKind::Section, &[ChildRef::unpinned(sub.entity.id)]);

    replace_block(&conn, c.entity.id, "c-v2");

    let logs = list_draft_change_logs(&conn, pkg.id).unwrap();
    let log_id = logs[logs.len() - 1].id;
    let (_, records) = get_draft_change_log(&conn, log_id).unwrap();
    let touched: Vec<i64> = records.iter().map(|r| r.entity_id).collect();
    assert_eq!(touched, vec![c.entity.id, u.entity.id, sub.entity.id, sec.entity.id]);
    assert!(records[1..].iter().all(|r| r.is_side_effect_only()));

    let effects = side_effects_for_log(&conn, Branch::Draft, log_id).unwrap();
    assert_eq!(effects.len(), 3);
    for (effect, pair) in effects.iter().zip(records.windows(2)) {
        assert_eq!(effect.cause_id, pair[0].id);
        assert_eq!(effect.effect_id, pair[1].id);
    }
}

#[test]
fn test_pinned_parent_gets_no_side_effect() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c, c_v1) = component(&conn, &pkg, "c");
    unit(&conn, &pkg, "u", &[ChildRef::pinned(c.entity.id, c_v1.id)]);

    replace_block(&conn, c.entity.id, "c-v2");

    let logs = list_draft_change_logs(&conn, pkg.id).unwrap();
    let (_, records) = get_draft_change_log(&conn, logs[logs.len() - 1].id).unwrap();
    assert_eq!(records.len(), 1);
}

// ---------------------------------------------------------------------------
// Digest rules
// ---------------------------------------------------------------------------

#[test]
fn test_leaf_digest_is_empty() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c, _) = component(&conn, &pkg, "c");

    assert_eq!(current_digest(&conn, Branch::Draft, c.entity.id).unwrap(), "");
}

#[test]
fn test_digest_is_empty_when_all_dependencies_soft_deleted() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c1, _) = component(&conn, &pkg, "c1");
    let (c2, _) = component(&conn, &pkg, "c2");
    let (u, _) = unit(
        &conn,
        &pkg,
        "u",
        &[ChildRef::unpinned(c1.entity.id), ChildRef::unpinned(c2.entity.id)],
    );
    let with_children = current_digest(&conn, Branch::Draft, u.entity.id).unwrap();
    assert_eq!(with_children.len(), 8);

    soft_delete_draft(&conn, c1.entity.id, ts(60), None).unwrap();
    let one_left = current_digest(&conn, Branch::Draft, u.entity.id).unwrap();
    assert_ne!(one_left, with_children);
    assert!(!one_left.is_empty());

    soft_delete_draft(&conn, c2.entity.id, ts(61), None).unwrap();
    assert_eq!(current_digest(&conn, Branch::Draft, u.entity.id).unwrap(), "");
}

#[test]
fn test_publish_does_not_touch_unrelated_records() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (ca, _) = component(&conn, &pkg, "ca");
    let (ua, _) = unit(&conn, &pkg, "ua", &[ChildRef::unpinned(ca.entity.id)]);
    let (cb, _) = component(&conn, &pkg, "cb");
    unit(&conn, &pkg, "ub", &[ChildRef::unpinned(cb.entity.id)]);
    let first = publish_all_drafts(&conn, pkg.id, &PublishOptions::default(), &ObserverRegistry::new())
        .unwrap()
        .unwrap();
    let before = publish_log_records(&conn, first.id).unwrap();
    let ua_digest = current_digest(&conn, Branch::Published, ua.entity.id).unwrap();

    replace_block(&conn, cb.entity.id, "cb-v2");
    let second = publish_from_drafts(
        &conn,
        pkg.id,
        &[cb.entity.id],
        &PublishOptions::default(),
        &ObserverRegistry::new(),
    )
    .unwrap()
    .unwrap();

    assert_eq!(publish_log_records(&conn, first.id).unwrap(), before);
    assert_eq!(current_digest(&conn, Branch::Published, ua.entity.id).unwrap(), ua_digest);
    let touched: Vec<i64> = publish_log_records(&conn, second.id)
        .unwrap()
        .iter()
        .map(|r| r.entity_id)
        .collect();
    assert!(!touched.contains(&ua.entity.id));
    assert!(!touched.contains(&ca.entity.id));
}

#[test]
fn test_backfill_agrees_with_incremental_digests() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c, _) = component(&conn, &pkg, "c");
    let (u, _) = unit(&conn, &pkg, "u", &[ChildRef::unpinned(c.entity.id)]);
    let (sub, _) = container(&conn, &pkg, "sub", ContainerKind::Subsection, &[ChildRef::unpinned(u.entity.id)]);
    publish_everything(&conn, pkg.id);
    replace_block(&conn, c.entity.id, "c-v2");

    let ids = [c.entity.id, u.entity.id, sub.entity.id];
    let digests = |branch| -> Vec<String> {
        ids.iter()
            .map(|&id| current_digest(&conn, branch, id).unwrap())
            .collect()
    };
    let draft_before = digests(Branch::Draft);
    let published_before = digests(Branch::Published);

    assert_eq!(backfill_dependency_hashes(&conn, pkg.id, Branch::Draft).unwrap(), 3);
    assert_eq!(backfill_dependency_hashes(&conn, pkg.id, Branch::Published).unwrap(), 3);

    assert_eq!(digests(Branch::Draft), draft_before);
    assert_eq!(digests(Branch::Published), published_before);
}

#[test]
fn test_backfill_repairs_cleared_digests() {
    let (_tmp, conn) = setup_db();
    let pkg = package(&conn, "course-1");
    let (c, _) = component(&conn, &pkg, "c");
    let (u, _) = unit(&conn, &pkg, "u", &[ChildRef::unpinned(c.entity.id)]);
    let expected = current_digest(&conn, Branch::Draft, u.entity.id).unwrap();

    conn.execute("UPDATE draft_change_log_records SET dependencies_hash_digest = ''", [])
        .unwrap();
    assert_eq!(current_digest(&conn, Branch::Draft, u.entity.id).unwrap(), "");

    backfill_dependency_hashes(&conn, pkg.id, Branch::Draft).unwrap();
    assert_eq!(current_digest(&conn, Branch::Draft, u.entity.id).unwrap(), expected);
}
