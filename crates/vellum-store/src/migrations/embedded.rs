//! Embedded SQL migrations
//!
//! Migrations are embedded at compile time using include_str!

/// Migration metadata
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Get all embedded migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_packages_entities",
            sql: include_str!("../../migrations/001_packages_entities.sql"),
        },
        Migration {
            id: "002_change_logs",
            sql: include_str!("../../migrations/002_change_logs.sql"),
        },
        Migration {
            id: "003_containers_components",
            sql: include_str!("../../migrations/003_containers_components.sql"),
        },
    ]
}
