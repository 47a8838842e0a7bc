//! User account entity.
//!
//! # Invariants
//! - Emails are unique across the store (enforced at registration time).
//! - Every persisted account holds at least one role.
//! - The password hash never reaches a client: only [`UserProfile`] is ever
//!   serialized onto the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bugtrackd_auth::Role;
use bugtrackd_core::UserId;

/// Role names accepted at registration time.
pub const ASSIGNABLE_ROLES: [&str; 5] = [
    "Business Analyst",
    "Developer",
    "Quality Analyst",
    "Product Manager",
    "Technical Manager",
];

/// Stored user document (collection `User`).
///
/// This struct is the persistence shape: it carries the bcrypt hash and is
/// only (de)serialized by the store. Anything client-facing goes through
/// [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub given_name: String,
    pub family_name: String,
    pub roles: Vec<Role>,
    pub created_on: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_by: Option<UserId>,
}

impl User {
    /// Build a new account from validated registration input.
    ///
    /// `password_hash` must already be hashed; this constructor never sees a
    /// plaintext password.
    pub fn register(
        id: UserId,
        new_user: &NewUser,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email: new_user.email.trim().to_string(),
            password_hash,
            given_name: new_user.given_name.trim().to_string(),
            family_name: new_user.family_name.trim().to_string(),
            roles: vec![Role::new(new_user.role.clone())],
            created_on: now,
            last_updated_on: None,
            last_updated_by: None,
        }
    }

    /// Apply a patch in place, stamping the update metadata.
    ///
    /// Returns the JSON payload that was applied so the caller can hand the
    /// same object to the audit log.
    pub fn apply_patch(
        &mut self,
        patch: &UserPatch,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> serde_json::Value {
        if let Some(email) = &patch.email {
            self.email = email.trim().to_string();
        }
        if let Some(given_name) = &patch.given_name {
            self.given_name = given_name.trim().to_string();
        }
        if let Some(family_name) = &patch.family_name {
            self.family_name = family_name.trim().to_string();
        }
        if let Some(hash) = &patch.password_hash {
            self.password_hash = hash.clone();
        }
        if let Some(roles) = &patch.roles {
            self.roles = roles.clone();
        }
        self.last_updated_on = Some(now);
        self.last_updated_by = Some(actor);

        let mut update =
            serde_json::to_value(patch).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(map) = update.as_object_mut() {
            map.insert("last_updated_on".to_string(), serde_json::json!(now));
            map.insert("last_updated_by".to_string(), serde_json::json!(actor));
        }
        update
    }
}

/// Validated registration input (plaintext password; hashed by the caller
/// before it ever touches a `User`).
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub given_name: String,
    pub family_name: String,
    pub role: String,
}

/// Partial update to a user document.
///
/// Serializes with absent fields omitted, which makes it double as the
/// audit `update` payload for the edit record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.given_name.is_none()
            && self.family_name.is_none()
            && self.password_hash.is_none()
            && self.roles.is_none()
    }
}

/// Client-facing projection of a user: everything except the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub roles: Vec<Role>,
    pub created_on: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_by: Option<UserId>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            roles: user.roles.clone(),
            created_on: user.created_on,
            last_updated_on: user.last_updated_on,
            last_updated_by: user.last_updated_by,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.contains('@') && !email.starts_with('@') && !email.ends_with('@')
}

/// Validate registration input, collecting field-level messages.
pub fn validate_new_user(input: &NewUser) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if !valid_email(&input.email) {
        errors.push("Invalid email format".to_string());
    }
    if input.password.len() < 6 {
        errors.push("Password must be at least 6 characters long".to_string());
    }
    if input.given_name.trim().is_empty() {
        errors.push("Given name is required".to_string());
    }
    if input.family_name.trim().is_empty() {
        errors.push("Family name is required".to_string());
    }
    if !ASSIGNABLE_ROLES.contains(&input.role.as_str()) {
        errors.push(format!(
            "Role must be one of the following: {}",
            ASSIGNABLE_ROLES.join(", ")
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate the raw fields of an update request.
///
/// `password` is the plaintext (pre-hash) value; updates require at least
/// eight characters.
pub fn validate_patch(
    email: Option<&str>,
    password: Option<&str>,
    roles: Option<&[String]>,
) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(email) = email {
        if !valid_email(email) {
            errors.push("Invalid email format".to_string());
        }
    }
    if let Some(password) = password {
        if password.len() < 8 {
            errors.push("Password must be at least 8 characters long".to_string());
        }
    }
    if let Some(roles) = roles {
        if roles.is_empty() {
            errors.push("At least one role is required".to_string());
        }
        for role in roles {
            if !ASSIGNABLE_ROLES.contains(&role.as_str()) {
                errors.push(format!(
                    "Role must be one of the following: {}",
                    ASSIGNABLE_ROLES.join(", ")
                ));
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
            given_name: "Alice".to_string(),
            family_name: "Smith".to_string(),
            role: "Developer".to_string(),
        }
    }

    #[test]
    fn register_assigns_single_role() {
        let input = new_user();
        let user = User::register(UserId::new(), &input, "hash".to_string(), Utc::now());

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.roles.len(), 1);
        assert_eq!(user.roles[0].as_str(), "Developer");
        assert!(user.last_updated_on.is_none());
    }

    #[test]
    fn validate_rejects_bad_email_and_short_password() {
        let mut input = new_user();
        input.email = "not-an-email".to_string();
        input.password = "abc".to_string();

        let errors = validate_new_user(&input).unwrap_err();
        assert!(errors.contains(&"Invalid email format".to_string()));
        assert!(errors.iter().any(|e| e.contains("at least 6 characters")));
    }

    #[test]
    fn validate_rejects_unknown_role() {
        let mut input = new_user();
        input.role = "Wizard".to_string();

        let errors = validate_new_user(&input).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Role must be one of the following"));
    }

    #[test]
    fn patch_stamps_update_metadata() {
        let mut user = User::register(UserId::new(), &new_user(), "hash".to_string(), Utc::now());
        let actor = UserId::new();

        let patch = UserPatch {
            given_name: Some("Alicia".to_string()),
            ..Default::default()
        };
        user.apply_patch(&patch, actor, Utc::now());

        assert_eq!(user.given_name, "Alicia");
        assert_eq!(user.last_updated_by, Some(actor));
        assert!(user.last_updated_on.is_some());
    }

    #[test]
    fn profile_never_carries_the_hash() {
        let user = User::register(UserId::new(), &new_user(), "hash".to_string(), Utc::now());
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = UserPatch {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "email": "new@example.com" }));
    }
}
