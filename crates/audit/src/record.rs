//! Audit (edit) records.
//!
//! One record per mutating operation, appended to the `edits` collection.
//! Records are append-only: nothing in the application updates or deletes
//! them. The store commits each record in the same transaction as the
//! write it describes, so a client that saw a success response can rely on
//! the record existing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use bugtrackd_auth::Role;
use bugtrackd_core::{BugId, EditId, TestCaseId, UserId};

/// Collection name recorded for user mutations.
pub const USER_COLLECTION: &str = "User";
/// Collection name recorded for bug mutations.
pub const BUGS_COLLECTION: &str = "Bugs";

/// Kind of mutation performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOp {
    Insert,
    Update,
    Delete,
}

/// What the mutation targeted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditTarget {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bug_id: Option<BugId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test_id: Option<TestCaseId>,
}

impl EditTarget {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn bug(bug_id: BugId) -> Self {
        Self {
            bug_id: Some(bug_id),
            ..Default::default()
        }
    }

    pub fn bug_test(bug_id: BugId, test_id: TestCaseId) -> Self {
        Self {
            bug_id: Some(bug_id),
            test_id: Some(test_id),
            ..Default::default()
        }
    }
}

/// Snapshot of the acting principal at mutation time.
///
/// Kept small on purpose: enough to answer "who did this" without joining
/// back to a user document that may since have changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub email: String,
    pub roles: Vec<Role>,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub id: EditId,
    pub timestamp: DateTime<Utc>,
    /// Target collection name (`User` or `Bugs`).
    pub collection: String,
    pub op: EditOp,
    pub target: EditTarget,
    /// The update payload that was applied.
    pub update: JsonValue,
    /// The authenticated principal that performed the mutation. `None` only
    /// for self-registration, where no session exists yet.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auth: Option<Actor>,
}

impl EditRecord {
    pub fn new(
        collection: &str,
        op: EditOp,
        target: EditTarget,
        update: JsonValue,
        auth: Option<Actor>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EditId::new(),
            timestamp,
            collection: collection.to_string(),
            op,
            target,
            update,
            auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_the_original_edit_shape() {
        let bug_id = BugId::new();
        let actor = Actor {
            user_id: UserId::new(),
            email: "alice@example.com".to_string(),
            roles: vec![Role::new("Developer")],
        };

        let record = EditRecord::new(
            BUGS_COLLECTION,
            EditOp::Update,
            EditTarget::bug(bug_id),
            json!({ "status": "Closed" }),
            Some(actor.clone()),
            Utc::now(),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["collection"], "Bugs");
        assert_eq!(value["op"], "update");
        assert_eq!(value["target"]["bug_id"], bug_id.to_string());
        assert!(value["target"].get("user_id").is_none());
        assert_eq!(value["auth"]["email"], "alice@example.com");
    }

    #[test]
    fn test_target_carries_both_ids() {
        let bug_id = BugId::new();
        let test_id = TestCaseId::new();
        let target = EditTarget::bug_test(bug_id, test_id);

        assert_eq!(target.bug_id, Some(bug_id));
        assert_eq!(target.test_id, Some(test_id));
        assert_eq!(target.user_id, None);
    }
}
