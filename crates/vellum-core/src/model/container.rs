use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityListId, EntityVersion, VersionId};
use crate::errors::VellumError;

/// Concrete kind of a container, stored one-to-one beside the container row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// No restriction on children.
    Generic,
    /// Holds components.
    Unit,
    /// Holds units.
    Subsection,
    /// Holds subsections.
    Section,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Generic => "generic",
            ContainerKind::Unit => "unit",
            ContainerKind::Subsection => "subsection",
            ContainerKind::Section => "section",
        }
    }

    /// Whether a child of the given kind may appear in this container's list.
    pub fn accepts(&self, child: ChildKind) -> bool {
        match self {
            ContainerKind::Generic => true,
            ContainerKind::Unit => child == ChildKind::Component,
            ContainerKind::Subsection => child == ChildKind::Container(ContainerKind::Unit),
            ContainerKind::Section => child == ChildKind::Container(ContainerKind::Subsection),
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerKind {
    type Err = VellumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ContainerKind::Generic),
            "unit" => Ok(ContainerKind::Unit),
            "subsection" => Ok(ContainerKind::Subsection),
            "section" => Ok(ContainerKind::Section),
            other => Err(VellumError::InvalidInput {
                reason: format!("unknown container kind '{}'", other),
            }),
        }
    }
}

/// What a prospective child entity is, for kind checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Component,
    Container(ContainerKind),
    /// A bare publishable entity with no specialization.
    Plain,
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildKind::Component => f.write_str("component"),
            ChildKind::Container(kind) => write!(f, "{}", kind),
            ChildKind::Plain => f.write_str("entity"),
        }
    }
}

/// A requested child: the entity plus an optional pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildRef {
    pub entity_id: EntityId,
    pub pinned_version_id: Option<VersionId>,
}

impl ChildRef {
    pub fn unpinned(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            pinned_version_id: None,
        }
    }

    pub fn pinned(entity_id: EntityId, version_id: VersionId) -> Self {
        Self {
            entity_id,
            pinned_version_id: Some(version_id),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_version_id.is_some()
    }
}

/// Stored row of an entity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityListRow {
    pub entity_list_id: EntityListId,
    pub order_num: u32,
    pub entity_id: EntityId,
    pub pinned_version_id: Option<VersionId>,
}

impl EntityListRow {
    pub fn as_child_ref(&self) -> ChildRef {
        ChildRef {
            entity_id: self.entity_id,
            pinned_version_id: self.pinned_version_id,
        }
    }
}

/// A child resolved to a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub entity_id: EntityId,
    pub version_id: VersionId,
    pub pinned: bool,
}

/// How `children` of a next container version combine with the previous list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildrenAction {
    #[default]
    Replace,
    Append,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub entity: Entity,
    pub kind: ContainerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerVersion {
    pub version: EntityVersion,
    pub entity_list_id: EntityListId,
}

/// A container's published state as of some publish log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub container_version: EntityVersion,
    pub children: Vec<ChildEntry>,
}
