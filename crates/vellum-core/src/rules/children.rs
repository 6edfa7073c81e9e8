//! Rules for the child list of a container version.

use crate::errors::{Result, VellumError};
use crate::model::{ChildKind, ChildRef, ContainerKind, EntityId, PackageId};

/// What the store knows about one requested child.
#[derive(Debug, Clone)]
pub struct ChildFacts {
    pub child: ChildRef,
    pub package_id: PackageId,
    pub kind: ChildKind,
    /// Owner of the pinned version, when the child is pinned.
    pub pinned_version_owner: Option<EntityId>,
}

/// Check a requested child list against its container.
///
/// Rules, in order, per child:
/// 1. the child belongs to the container's package
/// 2. a pinned version belongs to the named child entity
/// 3. the child kind is allowed by the container kind
///
/// # Errors
///
/// Returns `CrossPackageReference`, `PinnedVersionMismatch` or
/// `InvalidChildType` for the first offending child.
pub fn validate_children(
    kind: ContainerKind,
    package_id: PackageId,
    children: &[ChildFacts],
) -> Result<()> {
    for facts in children {
        let child_id = facts.child.entity_id;
        if facts.package_id != package_id {
            return Err(VellumError::CrossPackageReference {
                package_id,
                child_id,
                child_package_id: facts.package_id,
            });
        }
        if let Some(version_id) = facts.child.pinned_version_id {
            if facts.pinned_version_owner != Some(child_id) {
                return Err(VellumError::PinnedVersionMismatch {
                    entity_id: child_id,
                    version_id,
                });
            }
        }
        if !kind.accepts(facts.kind) {
            return Err(VellumError::InvalidChildType {
                kind,
                child_id,
                reason: format!("a {} is not an allowed child", facts.kind),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(entity_id: EntityId, package_id: PackageId) -> ChildFacts {
        ChildFacts {
            child: ChildRef::unpinned(entity_id),
            package_id,
            kind: ChildKind::Component,
            pinned_version_owner: None,
        }
    }

    #[test]
    fn test_accepts_same_package_components_in_unit() {
        let children = [component(1, 7), component(2, 7)];
        assert!(validate_children(ContainerKind::Unit, 7, &children).is_ok());
    }

    #[test]
    fn test_rejects_cross_package_child() {
        let err = validate_children(ContainerKind::Unit, 7, &[component(1, 8)]).unwrap_err();
        assert!(matches!(err, VellumError::CrossPackageReference { child_id: 1, .. }));
    }

    #[test]
    fn test_rejects_pin_to_foreign_version() {
        let mut facts = component(1, 7);
        facts.child = ChildRef::pinned(1, 99);
        facts.pinned_version_owner = Some(2);
        let err = validate_children(ContainerKind::Unit, 7, &[facts]).unwrap_err();
        assert!(matches!(err, VellumError::PinnedVersionMismatch { version_id: 99, .. }));
    }

    #[test]
    fn test_rejects_wrong_child_kind() {
        let facts = ChildFacts {
            child: ChildRef::unpinned(3),
            package_id: 7,
            kind: ChildKind::Container(ContainerKind::Unit),
            pinned_version_owner: None,
        };
        let err = validate_children(ContainerKind::Section, 7, &[facts]).unwrap_err();
        assert!(matches!(err, VellumError::InvalidChildType { .. }));
    }
}
