//! Bug entity.
//!
//! A bug is one document: lifecycle metadata plus embedded comment and
//! test-case sequences. Bugs are never hard-deleted; only test cases
//! support removal. Every mutator returns the JSON payload it applied so
//! the caller can hand the same object to the audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use bugtrackd_auth::Ownership;
use bugtrackd_core::{BugId, CommentId, DomainError, TestCaseId, UserId};

/// Classification applied to bugs nobody has triaged yet.
pub const UNCLASSIFIED: &str = "unclassified";

/// Pass/fail outcome of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// A comment on a bug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    /// Display name of the author at posting time.
    pub author: String,
    pub comment: String,
    pub posted_on: DateTime<Utc>,
}

/// A test case attached to a bug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: TestCaseId,
    pub description: String,
    pub status: TestStatus,
    pub tested_by: String,
    pub created_on: DateTime<Utc>,
    pub tested_on: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_by: Option<UserId>,
}

/// Stored bug document (collection `Bugs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    pub id: BugId,
    pub title: String,
    pub description: String,
    pub classification: String,
    pub status: String,
    pub closed: bool,
    pub created_on: DateTime<Utc>,
    pub created_by: UserId,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assigned_to: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assigned_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assigned_by: Option<UserId>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub classified_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub classified_by: Option<UserId>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_by: Option<UserId>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_by: Option<UserId>,

    pub comments: Vec<Comment>,
    pub test_cases: Vec<TestCase>,
}

/// Partial update applied through `PATCH /bug/:id`.
///
/// Serializes with absent fields omitted so it doubles as the audit
/// `update` payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BugPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
}

/// Partial update to a test case.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tested_by: Option<String>,
}

impl Bug {
    /// Create a bug from a validated report.
    ///
    /// Status starts at `Open` regardless of what the reporter sent, and the
    /// comment thread is seeded with the initial-report entry.
    pub fn report(
        id: BugId,
        title: String,
        description: String,
        classification: String,
        created_by: UserId,
        author: String,
        now: DateTime<Utc>,
    ) -> Self {
        let classification = if classification.trim().is_empty() {
            UNCLASSIFIED.to_string()
        } else {
            classification
        };

        Self {
            id,
            title,
            description,
            classification,
            status: "Open".to_string(),
            closed: false,
            created_on: now,
            created_by,
            assigned_to: None,
            assigned_on: None,
            assigned_by: None,
            classified_on: None,
            classified_by: None,
            closed_on: None,
            closed_by: None,
            last_updated_on: None,
            last_updated_by: None,
            comments: vec![Comment {
                id: CommentId::new(),
                author,
                comment: "Initial report".to_string(),
                posted_on: now,
            }],
            test_cases: Vec::new(),
        }
    }

    /// The caller's relationship to this bug, for access decisions.
    pub fn ownership(&self, caller: UserId) -> Ownership {
        Ownership {
            is_creator: self.created_by == caller,
            is_assignee: self.assigned_to == Some(caller),
        }
    }

    /// Apply a general patch, stamping update metadata.
    pub fn apply_patch(&mut self, patch: &BugPatch, actor: UserId, now: DateTime<Utc>) -> JsonValue {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(classification) = &patch.classification {
            self.classification = classification.clone();
        }
        if let Some(status) = &patch.status {
            self.status = status.clone();
        }
        if let Some(assigned_to) = patch.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        self.last_updated_on = Some(now);
        self.last_updated_by = Some(actor);

        let mut update = serde_json::to_value(patch).unwrap_or_else(|_| json!({}));
        if let Some(map) = update.as_object_mut() {
            map.insert("last_updated_on".to_string(), json!(now));
            map.insert("last_updated_by".to_string(), json!(actor));
        }
        update
    }

    /// Set the classification, recording who triaged and when.
    pub fn classify(&mut self, classification: String, actor: UserId, now: DateTime<Utc>) -> JsonValue {
        self.classification = classification.clone();
        self.classified_on = Some(now);
        self.classified_by = Some(actor);

        json!({
            "classification": classification,
            "classified_on": now,
            "classified_by": actor,
        })
    }

    /// Assign the bug to a user.
    pub fn assign(&mut self, assigned_to: UserId, actor: UserId, now: DateTime<Utc>) -> JsonValue {
        self.assigned_to = Some(assigned_to);
        self.assigned_on = Some(now);
        self.assigned_by = Some(actor);

        json!({
            "assigned_to": assigned_to,
            "assigned_on": now,
            "assigned_by": actor,
        })
    }

    /// Close or reopen the bug.
    ///
    /// Reopening clears the close metadata rather than leaving stale
    /// `closed_on`/`closed_by` values behind.
    pub fn set_closed(&mut self, closed: bool, actor: UserId, now: DateTime<Utc>) -> JsonValue {
        self.closed = closed;
        if closed {
            self.closed_on = Some(now);
            self.closed_by = Some(actor);
            json!({
                "closed": true,
                "closed_on": now,
                "closed_by": actor,
            })
        } else {
            self.closed_on = None;
            self.closed_by = None;
            json!({
                "closed": false,
                "closed_on": null,
                "closed_by": null,
            })
        }
    }

    /// Append a comment.
    pub fn add_comment(&mut self, author: String, text: String, now: DateTime<Utc>) -> Comment {
        let comment = Comment {
            id: CommentId::new(),
            author,
            comment: text,
            posted_on: now,
        };
        self.comments.push(comment.clone());
        comment
    }

    pub fn find_comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Append a test case.
    pub fn add_test(
        &mut self,
        description: String,
        status: TestStatus,
        tested_by: String,
        tested_on: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> TestCase {
        let test = TestCase {
            id: TestCaseId::new(),
            description,
            status,
            tested_by,
            created_on: now,
            tested_on: tested_on.unwrap_or(now),
            last_updated_on: None,
            last_updated_by: None,
        };
        self.test_cases.push(test.clone());
        test
    }

    pub fn find_test(&self, id: TestCaseId) -> Option<&TestCase> {
        self.test_cases.iter().find(|t| t.id == id)
    }

    /// Update a test case in place.
    pub fn update_test(
        &mut self,
        id: TestCaseId,
        patch: &TestPatch,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<TestCase, DomainError> {
        let test = self
            .test_cases
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(DomainError::NotFound)?;

        if let Some(description) = &patch.description {
            test.description = description.clone();
        }
        if let Some(status) = patch.status {
            test.status = status;
        }
        if let Some(tested_by) = &patch.tested_by {
            test.tested_by = tested_by.clone();
        }
        test.last_updated_on = Some(now);
        test.last_updated_by = Some(actor);

        Ok(test.clone())
    }

    /// Remove a test case, returning the deleted document.
    pub fn remove_test(&mut self, id: TestCaseId) -> Option<TestCase> {
        let idx = self.test_cases.iter().position(|t| t.id == id)?;
        Some(self.test_cases.remove(idx))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request validation
// ─────────────────────────────────────────────────────────────────────────────

/// Validate a bug report: every field is required.
pub fn validate_report(
    title: &str,
    description: &str,
    classification: &str,
    status: &str,
) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if title.trim().is_empty() {
        errors.push("\"title\" is required".to_string());
    }
    if description.trim().is_empty() {
        errors.push("\"description\" is required".to_string());
    }
    if classification.trim().is_empty() {
        errors.push("\"classification\" is required".to_string());
    }
    if status.trim().is_empty() {
        errors.push("\"status\" is required".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_comment(text: &str) -> Result<(), Vec<String>> {
    if text.trim().is_empty() {
        Err(vec!["Comment text is required".to_string()])
    } else {
        Ok(())
    }
}

/// Validate a new test case; returns the parsed status on success.
pub fn validate_test(
    description: &str,
    status: &str,
    tested_by: &str,
) -> Result<TestStatus, Vec<String>> {
    let mut errors = Vec::new();

    if description.trim().is_empty() {
        errors.push("Test description is required.".to_string());
    }
    let parsed = TestStatus::parse(status);
    if parsed.is_none() {
        errors.push("Test status must be either \"passed\" or \"failed\".".to_string());
    }
    if tested_by.trim().is_empty() {
        errors.push("Tester name is required.".to_string());
    }

    match (errors.is_empty(), parsed) {
        (true, Some(status)) => Ok(status),
        _ => Err(errors),
    }
}

/// Validate a test-case patch; at least one field must be present.
pub fn validate_test_patch(
    description: Option<&str>,
    status: Option<&str>,
    tested_by: Option<&str>,
) -> Result<Option<TestStatus>, Vec<String>> {
    if description.is_none() && status.is_none() && tested_by.is_none() {
        return Err(vec!["At least one field must be updated.".to_string()]);
    }

    match status {
        None => Ok(None),
        Some(raw) => match TestStatus::parse(raw) {
            Some(parsed) => Ok(Some(parsed)),
            None => Err(vec![
                "Test status must be either \"passed\" or \"failed\".".to_string(),
            ]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported() -> Bug {
        Bug::report(
            BugId::new(),
            "Crash on save".to_string(),
            "Editor crashes when saving an empty file".to_string(),
            "bug".to_string(),
            UserId::new(),
            "alice".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn report_seeds_initial_comment_and_open_status() {
        let bug = reported();

        assert_eq!(bug.status, "Open");
        assert!(!bug.closed);
        assert_eq!(bug.comments.len(), 1);
        assert_eq!(bug.comments[0].comment, "Initial report");
        assert_eq!(bug.comments[0].author, "alice");
        assert!(bug.test_cases.is_empty());
    }

    #[test]
    fn report_defaults_blank_classification() {
        let bug = Bug::report(
            BugId::new(),
            "t".to_string(),
            "d".to_string(),
            "  ".to_string(),
            UserId::new(),
            "alice".to_string(),
            Utc::now(),
        );
        assert_eq!(bug.classification, UNCLASSIFIED);
    }

    #[test]
    fn classify_records_who_and_when() {
        let mut bug = reported();
        let actor = UserId::new();

        let update = bug.classify("duplicate".to_string(), actor, Utc::now());

        assert_eq!(bug.classification, "duplicate");
        assert_eq!(bug.classified_by, Some(actor));
        assert!(bug.classified_on.is_some());
        assert_eq!(update["classification"], "duplicate");
    }

    #[test]
    fn reopen_clears_close_metadata() {
        let mut bug = reported();
        let actor = UserId::new();

        bug.set_closed(true, actor, Utc::now());
        assert!(bug.closed);
        assert_eq!(bug.closed_by, Some(actor));

        bug.set_closed(false, actor, Utc::now());
        assert!(!bug.closed);
        assert!(bug.closed_on.is_none());
        assert!(bug.closed_by.is_none());
    }

    #[test]
    fn ownership_tracks_creator_and_assignee() {
        let mut bug = reported();
        let creator = bug.created_by;
        let assignee = UserId::new();
        bug.assign(assignee, creator, Utc::now());

        assert!(bug.ownership(creator).is_creator);
        assert!(!bug.ownership(creator).is_assignee);
        assert!(bug.ownership(assignee).is_assignee);
        assert_eq!(bug.ownership(UserId::new()), Ownership::none());
    }

    #[test]
    fn test_case_lifecycle() {
        let mut bug = reported();
        let actor = UserId::new();

        let test = bug.add_test(
            "Save an empty file".to_string(),
            TestStatus::Failed,
            "qa".to_string(),
            None,
            Utc::now(),
        );
        assert_eq!(bug.test_cases.len(), 1);

        let patch = TestPatch {
            status: Some(TestStatus::Passed),
            ..Default::default()
        };
        let updated = bug.update_test(test.id, &patch, actor, Utc::now()).unwrap();
        assert_eq!(updated.status, TestStatus::Passed);
        assert_eq!(updated.last_updated_by, Some(actor));

        let removed = bug.remove_test(test.id).unwrap();
        assert_eq!(removed.id, test.id);
        assert!(bug.test_cases.is_empty());
        assert!(bug.remove_test(test.id).is_none());
    }

    #[test]
    fn update_missing_test_is_not_found() {
        let mut bug = reported();
        let err = bug
            .update_test(TestCaseId::new(), &TestPatch::default(), UserId::new(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn patch_payload_includes_update_stamp() {
        let mut bug = reported();
        let actor = UserId::new();
        let patch = BugPatch {
            status: Some("In Progress".to_string()),
            ..Default::default()
        };

        let update = bug.apply_patch(&patch, actor, Utc::now());

        assert_eq!(bug.status, "In Progress");
        assert_eq!(update["status"], "In Progress");
        assert!(update.get("last_updated_on").is_some());
        assert!(update.get("title").is_none());
    }

    #[test]
    fn report_validation_collects_all_messages() {
        let errors = validate_report("", "", "x", "").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("title"));
    }

    #[test]
    fn test_patch_requires_a_field() {
        assert!(validate_test_patch(None, None, None).is_err());
        assert_eq!(validate_test_patch(Some("d"), None, None), Ok(None));
        assert!(validate_test_patch(None, Some("flaky"), None).is_err());
        assert_eq!(
            validate_test_patch(None, Some("passed"), None),
            Ok(Some(TestStatus::Passed))
        );
    }
}
