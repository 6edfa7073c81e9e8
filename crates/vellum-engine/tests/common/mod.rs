// Shared fixtures for engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use tempfile::TempDir;
use vellum_core::model::{
    ChildRef, Component, ComponentType, Container, ContainerKind, ContainerVersion, ContentEntry, Entity,
    EntityVersion, NewVersion, Package,
};
use vellum_engine::commands::components::{create_component, create_component_version};
use vellum_engine::commands::containers::{create_container, create_container_version};
use vellum_engine::commands::entities::{create_entity, create_version};
use vellum_engine::commands::packages::create_package;
use vellum_store::db::{self, DbOptions};

pub fn setup_db() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let conn = open_at(&temp_dir);
    (temp_dir, conn)
}

/// Another configured connection to the database in `temp_dir`.
pub fn open_at(temp_dir: &TempDir) -> Connection {
    let mut conn = db::open(temp_dir.path().join("vellum.db")).unwrap();
    db::configure(&conn, &DbOptions::default()).unwrap();
    vellum_store::migrations::apply_migrations(&mut conn).unwrap();
    conn
}

/// Deterministic timestamp, `n` milliseconds after a fixed epoch.
pub fn ts(n: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + n).unwrap()
}

pub fn package(conn: &Connection, key: &str) -> Package {
    create_package(conn, key, &format!("Package {}", key), "", ts(0)).unwrap()
}

pub fn entity_with_version(conn: &Connection, package: &Package, key: &str) -> (Entity, EntityVersion) {
    let entity = create_entity(conn, package.id, key, ts(1), Some("author"), true).unwrap();
    let version = create_version(conn, entity.id, NewVersion::new(1, key, ts(2))).unwrap();
    (entity, version)
}

pub fn problem_type() -> ComponentType {
    ComponentType::new("xblock.v1", "problem")
}

pub fn content(key: &str, digest: &str) -> ContentEntry {
    ContentEntry {
        key: key.to_string(),
        content_digest: digest.to_string(),
        learner_downloadable: false,
    }
}

/// A component with a first version holding one `block.xml` entry.
pub fn component(conn: &Connection, package: &Package, local_key: &str) -> (Component, EntityVersion) {
    let component = create_component(conn, package.id, &problem_type(), local_key, ts(1), None, false).unwrap();
    let version = create_component_version(
        conn,
        component.entity.id,
        1,
        local_key,
        &[content("block.xml", &format!("{}-v1", local_key))],
        ts(2),
        None,
    )
    .unwrap();
    (component, version)
}

pub fn container(
    conn: &Connection,
    package: &Package,
    key: &str,
    kind: ContainerKind,
    children: &[ChildRef],
) -> (Container, ContainerVersion) {
    let container = create_container(conn, package.id, key, kind, ts(1), None, true).unwrap();
    let version = create_container_version(conn, container.entity.id, 1, key, children, ts(2), None).unwrap();
    (container, version)
}

pub fn unit(conn: &Connection, package: &Package, key: &str, children: &[ChildRef]) -> (Container, ContainerVersion) {
    container(conn, package, key, ContainerKind::Unit, children)
}
