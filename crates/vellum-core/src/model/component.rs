use serde::{Deserialize, Serialize};

use super::Entity;

/// Namespaced type of a component, e.g. `xblock.v1:problem`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentType {
    pub namespace: String,
    pub name: String,
}

impl ComponentType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Leaf entity carrying payload references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub entity: Entity,
    pub component_type: ComponentType,
    pub local_key: String,
}

/// A `key -> content digest` mapping held by one component version.
///
/// The digest addresses a payload in the external blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub key: String,
    pub content_digest: String,
    pub learner_downloadable: bool,
}
