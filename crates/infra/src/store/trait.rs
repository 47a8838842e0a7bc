//! Document-store contracts.
//!
//! One trait per collection concern. Design principles:
//!
//! - **No storage assumptions**: contracts work for the in-memory backend
//!   (tests/dev) and the Postgres JSONB backend (production).
//! - **Audit coupling**: every mutating method takes the [`EditRecord`]
//!   describing it, and implementations must commit document and record
//!   together or not at all. A caller that sees `Ok` can rely on the audit
//!   record existing.
//! - **Whole-document updates**: `update` replaces the stored document.
//!   Concurrent writers are last-write-wins; the application adds no
//!   version check on top of what the backend provides per document.

use async_trait::async_trait;
use thiserror::Error;

use bugtrackd_audit::EditRecord;
use bugtrackd_auth::{Role, RoleGrants};
use bugtrackd_bugs::Bug;
use bugtrackd_core::{BugId, UserId};
use bugtrackd_users::User;

/// Store operation error.
///
/// These are **infrastructure errors**; domain failures (validation,
/// invariants) never originate here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-email constraint violated on insert.
    #[error("email already registered")]
    DuplicateEmail,

    /// The targeted document does not exist.
    #[error("document not found")]
    NotFound,

    /// A document failed to (de)serialize.
    #[error("document serialization failed: {0}")]
    Serialization(String),

    /// The backend failed (connection, SQL, poisoned lock).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Sort order for user listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    #[default]
    GivenName,
    FamilyName,
    Role,
    Newest,
    Oldest,
}

impl UserSort {
    pub fn parse(s: &str) -> Self {
        match s {
            "family_name" => Self::FamilyName,
            "role" => Self::Role,
            "newest" => Self::Newest,
            "oldest" => Self::Oldest,
            _ => Self::GivenName,
        }
    }
}

/// Filter/sort parameters for `GET /user/list`.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Full-text keyword search over name and email fields.
    pub keywords: Option<String>,
    /// Only users holding this role name.
    pub role: Option<String>,
    /// Only accounts at least this many days old.
    pub min_age_days: Option<i64>,
    /// Only accounts at most this many days old.
    pub max_age_days: Option<i64>,
    pub sort: UserSort,
}

/// Sort order for bug listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BugSort {
    #[default]
    Newest,
    Oldest,
    Title,
    Classification,
    AssignedTo,
    CreatedBy,
}

impl BugSort {
    pub fn parse(s: &str) -> Self {
        match s {
            "oldest" => Self::Oldest,
            "title" => Self::Title,
            "classification" => Self::Classification,
            "assigned_to" => Self::AssignedTo,
            "created_by" => Self::CreatedBy,
            _ => Self::Newest,
        }
    }
}

/// Filter/sort/page parameters for `GET /bug/list`.
#[derive(Debug, Clone)]
pub struct BugQuery {
    /// Full-text keyword search over title and description.
    pub keywords: Option<String>,
    pub classification: Option<String>,
    /// Only bugs at least this many days old.
    pub min_age_days: Option<i64>,
    /// Only bugs at most this many days old.
    pub max_age_days: Option<i64>,
    pub closed: Option<bool>,
    pub sort: BugSort,
    pub page_size: u32,
    pub page_number: u32,
}

impl Default for BugQuery {
    fn default() -> Self {
        Self {
            keywords: None,
            classification: None,
            min_age_days: None,
            max_age_days: None,
            closed: None,
            sort: BugSort::default(),
            page_size: 9,
            page_number: 1,
        }
    }
}

/// Credential/account store (collection `User`).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn list(&self, query: &UserQuery) -> Result<Vec<User>, StoreError>;

    /// Insert a new account together with its audit record.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken;
    /// the duplicate check and the insert are one atomic step.
    async fn insert(&self, user: &User, edit: &EditRecord) -> Result<(), StoreError>;

    /// Replace the stored document together with its audit record.
    async fn update(&self, user: &User, edit: &EditRecord) -> Result<(), StoreError>;

    /// Delete the account together with its audit record.
    async fn delete(&self, id: UserId, edit: &EditRecord) -> Result<(), StoreError>;
}

/// Bug store (collection `Bugs`). No delete: bugs are never hard-deleted.
#[async_trait]
pub trait BugStore: Send + Sync {
    async fn find_by_id(&self, id: BugId) -> Result<Option<Bug>, StoreError>;

    async fn list(&self, query: &BugQuery) -> Result<Vec<Bug>, StoreError>;

    async fn insert(&self, bug: &Bug, edit: &EditRecord) -> Result<(), StoreError>;

    async fn update(&self, bug: &Bug, edit: &EditRecord) -> Result<(), StoreError>;
}

/// Role registry (collection `roles`). Read-only from the application's
/// point of view; seeding happens at startup/migration.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<RoleGrants>, StoreError>;

    /// Fetch every named role that exists. Unknown names are simply absent
    /// from the result, never an error.
    async fn find_many(&self, names: &[Role]) -> Result<Vec<RoleGrants>, StoreError>;
}

/// Append-only audit log (collection `edits`).
#[async_trait]
pub trait EditLog: Send + Sync {
    /// Append a standalone record (mutations that pair with a document
    /// write go through the combined store methods instead).
    async fn append(&self, record: &EditRecord) -> Result<(), StoreError>;

    /// Most recent records, newest first. For operational inspection and
    /// tests; the application never reads its own audit trail.
    async fn recent(&self, limit: usize) -> Result<Vec<EditRecord>, StoreError>;
}
