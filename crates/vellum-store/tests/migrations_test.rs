// Integration tests for the migration framework

use rusqlite::Connection;

fn setup_test_db() -> Connection {
    Connection::open_in_memory().expect("Failed to create in-memory database")
}

fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .unwrap();

    let tables = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();

    tables
}

#[test]
fn test_apply_migrations_on_empty_db() {
    // Given: An empty SQLite database
    let mut conn = setup_test_db();

    // When: Migrations are applied
    let applied = vellum_store::migrations::apply_migrations(&mut conn)
        .expect("Migrations should succeed");

    // Then: Every embedded migration ran, in order
    assert_eq!(
        applied,
        vec![
            "001_packages_entities",
            "002_change_logs",
            "003_containers_components"
        ]
    );

    // And: The full schema exists
    let tables = get_table_names(&conn);
    assert_eq!(tables.len(), 22, "unexpected tables: {:?}", tables);

    for expected_table in [
        "schema_version",
        "packages",
        "entities",
        "entity_versions",
        "version_dependencies",
        "draft_change_logs",
        "draft_change_log_records",
        "drafts",
        "draft_side_effects",
        "publish_logs",
        "publish_log_records",
        "published",
        "publish_side_effects",
        "entity_lists",
        "entity_list_rows",
        "containers",
        "container_kinds",
        "container_versions",
        "component_types",
        "components",
        "component_versions",
        "component_version_contents",
    ] {
        assert!(
            tables.contains(&expected_table.to_string()),
            "Missing table: {}",
            expected_table
        );
    }
}

#[test]
fn test_migration_idempotency() {
    // Given: A database with migrations already applied
    let mut conn = setup_test_db();
    vellum_store::migrations::apply_migrations(&mut conn).unwrap();

    // When: Migrations are re-run
    let applied = vellum_store::migrations::apply_migrations(&mut conn).unwrap();

    // Then: Nothing new ran and no duplicate version entries exist
    assert!(applied.is_empty());
    let version_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version_count, 3);
}

#[test]
fn test_checksum_recorded() {
    let mut conn = setup_test_db();
    vellum_store::migrations::apply_migrations(&mut conn).unwrap();

    let checksum: String = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?",
            ["001_packages_entities"],
            |row| row.get(0),
        )
        .unwrap();

    assert_eq!(checksum.len(), 64, "SHA256 checksum should be 64 hex chars");
}

#[test]
fn test_migrations_on_file_database_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let mut conn = vellum_store::db::open(&path).unwrap();
        vellum_store::db::configure(&conn, &vellum_store::db::DbOptions::default()).unwrap();
        vellum_store::migrations::apply_migrations(&mut conn).unwrap();
    }

    let mut conn = vellum_store::db::open(&path).unwrap();
    assert!(vellum_store::migrations::apply_migrations(&mut conn)
        .unwrap()
        .is_empty());
    assert_eq!(
        vellum_store::migrations::applied_migrations(&conn).unwrap().len(),
        3
    );
}
