use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityId, PackageId, VersionId};

/// Stable identity for one authored thing across all its versions.
///
/// Entities are never hard-deleted; removal is a soft delete of the draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub uuid: Uuid,
    pub package_id: PackageId,
    /// Unique within the package. Unlike `uuid`, a key may be renamed.
    pub key: String,
    pub created: DateTime<Utc>,
    pub created_by: Option<String>,
    /// False for entities that only exist as children of a container.
    pub can_stand_alone: bool,
}

/// Immutable snapshot of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVersion {
    pub id: VersionId,
    pub uuid: Uuid,
    pub entity_id: EntityId,
    /// 1-based, strictly increasing per entity.
    pub version_num: u32,
    pub title: String,
    pub created: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// Parameters for creating the next version of an entity.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub version_num: u32,
    pub title: String,
    pub created: DateTime<Utc>,
    pub created_by: Option<String>,
    /// Entities whose current branch version is part of this version's
    /// meaning. Containers list their unpinned children here.
    pub dependencies: Vec<EntityId>,
}

impl NewVersion {
    pub fn new(version_num: u32, title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            version_num,
            title: title.into(),
            created,
            created_by: None,
            dependencies: Vec::new(),
        }
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<EntityId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}
