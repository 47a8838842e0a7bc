//! Request DTOs and their validation.
//!
//! Bodies deserialize into explicit structs with optional fields; each
//! `validate` collects field-level messages and returns 400 material rather
//! than letting the extractor reject with an opaque status.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use bugtrackd_bugs::{TestStatus, validate_comment, validate_report, validate_test, validate_test_patch};
use bugtrackd_infra::{BugQuery, BugSort, UserQuery, UserSort};
use bugtrackd_users::{NewUser, validate_new_user, validate_patch};

fn require(field: Option<String>, message: &str, errors: &mut Vec<String>) -> String {
    match field {
        Some(value) => value,
        None => {
            errors.push(message.to_string());
            String::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub role: Option<String>,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewUser, Vec<String>> {
        let mut errors = Vec::new();

        let input = NewUser {
            email: require(self.email, "Email is required", &mut errors),
            password: require(self.password, "Password is required", &mut errors),
            given_name: require(self.given_name, "Given name is required", &mut errors),
            family_name: require(self.family_name, "Family name is required", &mut errors),
            role: require(self.role, "Role is required", &mut errors),
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        validate_new_user(&input)?;
        Ok(input)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> Result<(String, String), Vec<String>> {
        let mut errors = Vec::new();

        let email = require(self.email, "Email is required", &mut errors);
        let password = require(self.password, "Password is required", &mut errors);

        if email.is_empty() || !email.contains('@') {
            if !errors.iter().any(|e| e == "Email is required") {
                errors.push("Invalid email format".to_string());
            }
        }
        if !password.is_empty() && password.len() < 6 {
            errors.push("Password must be at least 6 characters long".to_string());
        }

        if errors.is_empty() {
            Ok((email, password))
        } else {
            Err(errors)
        }
    }
}

/// `role` accepts a single name or a list, like the form clients send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleInput {
    One(String),
    Many(Vec<String>),
}

impl RoleInput {
    pub fn into_names(self) -> Vec<String> {
        match self {
            RoleInput::One(name) => vec![name],
            RoleInput::Many(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<RoleInput>,
}

impl UpdateUserRequest {
    /// Validate; returns the (possibly absent) requested role names.
    pub fn validate(&self) -> Result<Option<Vec<String>>, Vec<String>> {
        let roles = self.role.clone().map(RoleInput::into_names);
        validate_patch(
            self.email.as_deref(),
            self.password.as_deref(),
            roles.as_deref(),
        )?;
        Ok(roles)
    }
}

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub keywords: Option<String>,
    pub role: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub sort_by: Option<String>,
}

impl UserListParams {
    pub fn into_query(self) -> UserQuery {
        UserQuery {
            keywords: self.keywords,
            role: self.role,
            min_age_days: self.min_age,
            max_age_days: self.max_age,
            sort: self.sort_by.as_deref().map(UserSort::parse).unwrap_or_default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bug requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportBugRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub status: Option<String>,
}

impl ReportBugRequest {
    pub fn validate(self) -> Result<(String, String, String), Vec<String>> {
        let title = self.title.unwrap_or_default();
        let description = self.description.unwrap_or_default();
        let classification = self.classification.unwrap_or_default();
        let status = self.status.unwrap_or_default();

        validate_report(&title, &description, &classification, &status)?;
        Ok((title, description, classification))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBugRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub classification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub closed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub comment: Option<String>,
}

impl CommentRequest {
    pub fn validate(self) -> Result<String, Vec<String>> {
        let text = self.comment.unwrap_or_default();
        validate_comment(&text)?;
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddTestRequest {
    pub description: Option<String>,
    pub status: Option<String>,
    pub tested_by: Option<String>,
    pub tested_on: Option<DateTime<Utc>>,
}

impl AddTestRequest {
    pub fn validate(self) -> Result<(String, TestStatus, String, Option<DateTime<Utc>>), Vec<String>> {
        let description = self.description.unwrap_or_default();
        let status = self.status.unwrap_or_default();
        let tested_by = self.tested_by.unwrap_or_default();

        let status = validate_test(&description, &status, &tested_by)?;
        Ok((description, status, tested_by, self.tested_on))
    }
}

#[derive(Debug, Deserialize)]
pub struct PatchTestRequest {
    pub description: Option<String>,
    pub status: Option<String>,
    pub tested_by: Option<String>,
}

impl PatchTestRequest {
    pub fn validate(&self) -> Result<Option<TestStatus>, Vec<String>> {
        validate_test_patch(
            self.description.as_deref(),
            self.status.as_deref(),
            self.tested_by.as_deref(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct BugListParams {
    pub keywords: Option<String>,
    pub classification: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub closed: Option<bool>,
    pub sort_by: Option<String>,
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
}

impl BugListParams {
    pub fn into_query(self) -> BugQuery {
        let defaults = BugQuery::default();
        BugQuery {
            keywords: self.keywords,
            classification: self.classification,
            min_age_days: self.min_age,
            max_age_days: self.max_age,
            closed: self.closed,
            sort: self.sort_by.as_deref().map(BugSort::parse).unwrap_or_default(),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            page_number: self.page_number.unwrap_or(defaults.page_number),
        }
    }
}
