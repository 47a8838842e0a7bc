use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::PermissionSet;

/// Role identifier used for RBAC.
///
/// Roles are intentionally opaque strings at this layer; mapping roles to
/// permissions is done against the role registry (usually store-backed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A role registry entry: a role name and the permission flags it grants.
///
/// This is the document stored in the `roles` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrants {
    pub name: String,
    pub permissions: PermissionSet,
}

impl RoleGrants {
    pub fn new(name: impl Into<String>, permissions: PermissionSet) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }
}

/// The seed role registry.
///
/// These five roles are the assignable set at registration time; a
/// deployment may edit the stored documents afterwards.
pub fn default_role_grants() -> Vec<RoleGrants> {
    vec![
        RoleGrants::new(
            "Developer",
            ["canViewData", "canEditMyBug", "canAddComments"]
                .into_iter()
                .collect(),
        ),
        RoleGrants::new(
            "Quality Analyst",
            [
                "canViewData",
                "canAddComments",
                "canAddTestCase",
                "canEditTestCase",
                "canDeleteTestCase",
                "canEditIfAssignedTo",
            ]
            .into_iter()
            .collect(),
        ),
        RoleGrants::new(
            "Business Analyst",
            ["canViewData", "canAddComments", "canClassifyAnyBug"]
                .into_iter()
                .collect(),
        ),
        RoleGrants::new(
            "Product Manager",
            [
                "canViewData",
                "canAddComments",
                "canClassifyAnyBug",
                "canReassignAnyBug",
                "canCloseAnyBug",
            ]
            .into_iter()
            .collect(),
        ),
        RoleGrants::new(
            "Technical Manager",
            [
                "canViewData",
                "canAddComments",
                "canClassifyAnyBug",
                "canReassignAnyBug",
                "canReassignIfAssignedTo",
                "canCloseAnyBug",
                "canEditAnyUser",
            ]
            .into_iter()
            .collect(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_five_roles() {
        let grants = default_role_grants();
        assert_eq!(grants.len(), 5);
        assert!(grants.iter().all(|g| g.permissions.allows_name("canViewData")));
    }

    #[test]
    fn developer_can_edit_own_bugs_only() {
        let grants = default_role_grants();
        let dev = grants.iter().find(|g| g.name == "Developer").unwrap();
        assert!(dev.permissions.allows_name("canEditMyBug"));
        assert!(!dev.permissions.allows_name("canCloseAnyBug"));
    }
}
