use serde::{Deserialize, Serialize};

use super::{EntityId, RecordId, VersionId};
use crate::errors::VellumError;

/// One of the two parallel views of every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Draft,
    Published,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Draft => "draft",
            Branch::Published => "published",
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Branch {
    type Err = VellumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Branch::Draft),
            "published" => Ok(Branch::Published),
            other => Err(VellumError::InvalidInput {
                reason: format!("unknown branch '{}', expected draft or published", other),
            }),
        }
    }
}

/// The Draft or Published row of one entity.
///
/// `version_id` is `None` after a soft delete (or before the first publish
/// of an entity that was deleted again). `log_record_id` points at the log
/// record that last touched this entity on the branch, directly or as a
/// side effect; its digest is the entity's current dependency digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPointer {
    pub entity_id: EntityId,
    pub version_id: Option<VersionId>,
    pub log_record_id: Option<RecordId>,
}

impl BranchPointer {
    pub fn is_live(&self) -> bool {
        self.version_id.is_some()
    }
}
