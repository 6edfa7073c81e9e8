use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityId, LogId, PackageId, RecordId, VersionId};

/// One batch of draft edits within a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftChangeLog {
    pub id: LogId,
    pub uuid: Uuid,
    pub package_id: PackageId,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
}

/// One atomic publish within a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishLog {
    pub id: LogId,
    pub uuid: Uuid,
    pub package_id: PackageId,
    pub message: String,
    pub published_at: DateTime<Utc>,
    pub published_by: Option<String>,
}

/// Per-entity entry of a draft change log or publish log.
///
/// At most one record exists per (log, entity). A record whose old and new
/// versions are equal was added purely as a side effect of a dependency
/// changing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: RecordId,
    pub log_id: LogId,
    pub entity_id: EntityId,
    pub old_version_id: Option<VersionId>,
    pub new_version_id: Option<VersionId>,
    /// Summary of the live dependency state; empty when there is none.
    pub dependencies_hash_digest: String,
}

impl LogRecord {
    pub fn is_side_effect_only(&self) -> bool {
        self.old_version_id == self.new_version_id
    }

    pub fn is_soft_delete(&self) -> bool {
        self.old_version_id.is_some() && self.new_version_id.is_none()
    }
}

/// `cause` changed, which changed `effect` without a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideEffect {
    pub cause_id: RecordId,
    pub effect_id: RecordId,
}
