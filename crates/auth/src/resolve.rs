//! Permission resolution: roles held by a user → one effective set.

use crate::{PermissionSet, Role, RoleGrants};

/// Resolve the effective permission set for a list of held role names.
///
/// Looks up every named role through `lookup` and unions the true-valued
/// flags across all of them. Unknown role names are silently skipped, never
/// errors: a dangling role reference resolves to nothing rather than
/// failing the request. Union is commutative, so role order does not affect
/// the result.
pub fn resolve_permissions<F>(roles: &[Role], lookup: F) -> PermissionSet
where
    F: Fn(&str) -> Option<RoleGrants>,
{
    let grants: Vec<RoleGrants> = roles
        .iter()
        .filter_map(|role| lookup(role.as_str()))
        .collect();
    merge_permissions(&grants)
}

/// Union the permission flags of already-fetched registry entries.
///
/// Pure and deterministic; shared by the login flow (token payload) and
/// registration-time role assignment.
pub fn merge_permissions(grants: &[RoleGrants]) -> PermissionSet {
    let mut merged = PermissionSet::new();
    for grant in grants {
        merged.union(&grant.permissions);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> Vec<RoleGrants> {
        vec![
            RoleGrants::new("Developer", ["canViewData", "canEditMyBug"].into_iter().collect()),
            RoleGrants::new("Quality Analyst", ["canViewData", "canAddTestCase"].into_iter().collect()),
        ]
    }

    fn lookup(name: &str) -> Option<RoleGrants> {
        registry().into_iter().find(|g| g.name == name)
    }

    #[test]
    fn union_across_roles() {
        let roles = vec![Role::new("Developer"), Role::new("Quality Analyst")];
        let perms = resolve_permissions(&roles, lookup);

        assert!(perms.allows_name("canViewData"));
        assert!(perms.allows_name("canEditMyBug"));
        assert!(perms.allows_name("canAddTestCase"));
    }

    #[test]
    fn unknown_roles_are_skipped() {
        let roles = vec![Role::new("Developer"), Role::new("Skunkworks")];
        let perms = resolve_permissions(&roles, lookup);

        assert!(perms.allows_name("canEditMyBug"));
        assert!(!perms.allows_name("canCloseAnyBug"));
    }

    #[test]
    fn all_unknown_resolves_empty() {
        let roles = vec![Role::new("Ghost")];
        assert!(resolve_permissions(&roles, lookup).is_empty());
    }

    proptest! {
        // Resolution must not depend on the order roles are held in.
        #[test]
        fn order_independent(mut names in proptest::collection::vec("[A-Za-z ]{1,20}", 0..6)) {
            names.push("Developer".to_string());
            names.push("Quality Analyst".to_string());

            let forward: Vec<Role> = names.iter().map(|n| Role::new(n.clone())).collect();
            let mut reversed = forward.clone();
            reversed.reverse();

            prop_assert_eq!(
                resolve_permissions(&forward, lookup),
                resolve_permissions(&reversed, lookup)
            );
        }
    }
}
