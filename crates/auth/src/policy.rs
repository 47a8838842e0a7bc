//! Access policy: flat permission checks and the ownership-or-permission
//! predicate shared by the entity-scoped routes.

use thiserror::Error;

use crate::{Permission, PermissionSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a flat permission check.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(permissions: &PermissionSet, required: &Permission) -> Result<(), AuthzError> {
    if permissions.allows(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Scope under which a permission applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allow {
    /// The permission alone suffices.
    Always,
    /// The permission applies only when the caller created the entity.
    IfCreator,
    /// The permission applies only when the caller is the entity's assignee.
    IfAssignee,
}

/// One clause of an access decision: a permission and the scope it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub permission: Permission,
    pub scope: Allow,
}

impl AccessRule {
    pub fn new(permission: Permission, scope: Allow) -> Self {
        Self { permission, scope }
    }

    pub fn always(name: &'static str) -> Self {
        Self::new(Permission::new(name), Allow::Always)
    }

    pub fn if_creator(name: &'static str) -> Self {
        Self::new(Permission::new(name), Allow::IfCreator)
    }

    pub fn if_assignee(name: &'static str) -> Self {
        Self::new(Permission::new(name), Allow::IfAssignee)
    }
}

/// The caller's relationship to the entity being acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub is_creator: bool,
    pub is_assignee: bool,
}

impl Ownership {
    pub fn none() -> Self {
        Self::default()
    }

    fn matches(&self, scope: Allow) -> bool {
        match scope {
            Allow::Always => true,
            Allow::IfCreator => self.is_creator,
            Allow::IfAssignee => self.is_assignee,
        }
    }
}

/// Evaluate an ownership-or-permission decision.
///
/// Grants when any rule's permission is held AND its scope matches the
/// caller's relationship to the entity. Rules are a disjunction; order is
/// irrelevant. Denial reports the first rule's permission (the blanket one
/// by convention) so the error names what the caller lacked.
pub fn evaluate(
    rules: &[AccessRule],
    permissions: &PermissionSet,
    ownership: Ownership,
) -> Result<(), AuthzError> {
    let granted = rules
        .iter()
        .any(|rule| permissions.allows(&rule.permission) && ownership.matches(rule.scope));

    if granted {
        Ok(())
    } else {
        let wanted = rules
            .first()
            .map(|r| r.permission.as_str().to_string())
            .unwrap_or_default();
        Err(AuthzError::Forbidden(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(names: &[&str]) -> PermissionSet {
        names.iter().copied().collect()
    }

    fn classify_rules() -> Vec<AccessRule> {
        vec![
            AccessRule::always("canClassifyAnyBug"),
            AccessRule::if_assignee("canEditIfAssignedTo"),
            AccessRule::if_creator("canEditMyBug"),
        ]
    }

    #[test]
    fn blanket_permission_needs_no_ownership() {
        let result = evaluate(
            &classify_rules(),
            &perms(&["canClassifyAnyBug"]),
            Ownership::none(),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn scoped_permission_requires_matching_ownership() {
        let permissions = perms(&["canEditMyBug"]);

        assert!(evaluate(&classify_rules(), &permissions, Ownership::none()).is_err());
        assert_eq!(
            evaluate(
                &classify_rules(),
                &permissions,
                Ownership {
                    is_creator: true,
                    is_assignee: false
                }
            ),
            Ok(())
        );
    }

    #[test]
    fn assignee_scope_matches_assignee_only() {
        let permissions = perms(&["canEditIfAssignedTo"]);
        let assignee = Ownership {
            is_creator: false,
            is_assignee: true,
        };

        assert_eq!(evaluate(&classify_rules(), &permissions, assignee), Ok(()));
        assert!(evaluate(&classify_rules(), &permissions, Ownership::none()).is_err());
    }

    #[test]
    fn ownership_without_permission_denies() {
        let owner = Ownership {
            is_creator: true,
            is_assignee: true,
        };
        let err = evaluate(&classify_rules(), &perms(&["canViewData"]), owner).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("canClassifyAnyBug".to_string()));
    }

    #[test]
    fn flat_authorize_checks_true_flags_only() {
        let permissions = perms(&["canViewData"]);
        assert!(authorize(&permissions, &Permission::new("canViewData")).is_ok());
        assert!(authorize(&permissions, &Permission::new("canEditMyBug")).is_err());
    }
}
