use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "canViewData"); the
/// policy layer only ever asks "is this name granted?".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set of granted permissions, serialized as a name → bool map.
///
/// Absence of a name means denied, as does an explicit `false`. The map
/// representation (rather than a plain set) matches the wire shape embedded
/// in issued tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, bool>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission by name.
    pub fn grant(&mut self, name: impl Into<String>) {
        self.0.insert(name.into(), true);
    }

    /// True only if the named permission is present and set to `true`.
    pub fn allows(&self, permission: &Permission) -> bool {
        self.0.get(permission.as_str()).copied().unwrap_or(false)
    }

    pub fn allows_name(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Union the true-valued flags of `other` into `self`.
    ///
    /// A permission granted by any contributing set is granted overall;
    /// `false` entries never revoke a previously granted flag.
    pub fn union(&mut self, other: &PermissionSet) {
        for (name, granted) in &other.0 {
            if *granted {
                self.0.insert(name.clone(), true);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.0.values().any(|granted| *granted)
    }

    /// Granted permission names, in lexicographic order.
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(name, _)| name.as_str())
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.grant(name);
        }
        set
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_false_both_deny() {
        let mut set = PermissionSet::new();
        set.0.insert("canViewData".to_string(), false);

        assert!(!set.allows(&Permission::new("canViewData")));
        assert!(!set.allows(&Permission::new("canEditMyBug")));
    }

    #[test]
    fn union_never_revokes() {
        let mut a: PermissionSet = ["canViewData"].into_iter().collect();
        let mut b = PermissionSet::new();
        b.0.insert("canViewData".to_string(), false);
        b.grant("canEditMyBug");

        a.union(&b);
        assert!(a.allows_name("canViewData"));
        assert!(a.allows_name("canEditMyBug"));
    }

    #[test]
    fn serializes_as_flag_map() {
        let set: PermissionSet = ["canViewData"].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!({ "canViewData": true }));
    }
}
