use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PackageId;

/// Unit of ownership and publishing. Every entity belongs to exactly one.
///
/// Packages themselves are not versioned; only their contents are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub uuid: Uuid,
    pub key: String,
    pub title: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}
