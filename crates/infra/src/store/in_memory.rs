//! In-memory document store.
//!
//! Intended for tests/dev. Keyword search approximates the production
//! backend's full-text index with case-insensitive substring matching.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use bugtrackd_audit::EditRecord;
use bugtrackd_auth::{Role, RoleGrants, default_role_grants};
use bugtrackd_bugs::Bug;
use bugtrackd_core::{BugId, UserId};
use bugtrackd_users::User;

use super::r#trait::{
    BugQuery, BugSort, BugStore, EditLog, RoleStore, StoreError, UserQuery, UserSort, UserStore,
};

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    bugs: RwLock<HashMap<BugId, Bug>>,
    roles: RwLock<HashMap<String, RoleGrants>>,
    edits: RwLock<Vec<EditRecord>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the default role registry.
    pub fn with_default_roles() -> Self {
        let store = Self::new();
        {
            let mut roles = store.roles.write().expect("fresh lock");
            for grant in default_role_grants() {
                roles.insert(grant.name.clone(), grant);
            }
        }
        store
    }

    fn push_edit(&self, edit: &EditRecord) -> Result<(), StoreError> {
        self.edits.write().map_err(|_| poisoned())?.push(edit.clone());
        Ok(())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn list(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let now = Utc::now();

        let mut matches: Vec<User> = users
            .values()
            .filter(|u| {
                if let Some(kw) = &query.keywords {
                    if !(contains_ci(&u.email, kw)
                        || contains_ci(&u.given_name, kw)
                        || contains_ci(&u.family_name, kw))
                    {
                        return false;
                    }
                }
                if let Some(role) = &query.role {
                    if !u.roles.iter().any(|r| r.as_str() == role) {
                        return false;
                    }
                }
                if let Some(max_age) = query.max_age_days {
                    if u.created_on < now - Duration::days(max_age) {
                        return false;
                    }
                }
                if let Some(min_age) = query.min_age_days {
                    if u.created_on > now - Duration::days(min_age) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        match query.sort {
            UserSort::GivenName => matches.sort_by(|a, b| a.given_name.cmp(&b.given_name)),
            UserSort::FamilyName => matches.sort_by(|a, b| a.family_name.cmp(&b.family_name)),
            UserSort::Role => matches.sort_by(|a, b| {
                let ra = a.roles.first().map(|r| r.as_str()).unwrap_or_default();
                let rb = b.roles.first().map(|r| r.as_str()).unwrap_or_default();
                ra.cmp(rb)
            }),
            UserSort::Newest => matches.sort_by(|a, b| b.created_on.cmp(&a.created_on)),
            UserSort::Oldest => matches.sort_by(|a, b| a.created_on.cmp(&b.created_on)),
        }

        Ok(matches)
    }

    async fn insert(&self, user: &User, edit: &EditRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        users.insert(user.id, user.clone());
        drop(users);
        self.push_edit(edit)
    }

    async fn update(&self, user: &User, edit: &EditRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        users.insert(user.id, user.clone());
        drop(users);
        self.push_edit(edit)
    }

    async fn delete(&self, id: UserId, edit: &EditRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        drop(users);
        self.push_edit(edit)
    }
}

#[async_trait]
impl BugStore for InMemoryStore {
    async fn find_by_id(&self, id: BugId) -> Result<Option<Bug>, StoreError> {
        let bugs = self.bugs.read().map_err(|_| poisoned())?;
        Ok(bugs.get(&id).cloned())
    }

    async fn list(&self, query: &BugQuery) -> Result<Vec<Bug>, StoreError> {
        let bugs = self.bugs.read().map_err(|_| poisoned())?;
        let now = Utc::now();

        let mut matches: Vec<Bug> = bugs
            .values()
            .filter(|b| {
                if let Some(kw) = &query.keywords {
                    if !(contains_ci(&b.title, kw) || contains_ci(&b.description, kw)) {
                        return false;
                    }
                }
                if let Some(classification) = &query.classification {
                    if &b.classification != classification {
                        return false;
                    }
                }
                if let Some(closed) = query.closed {
                    if b.closed != closed {
                        return false;
                    }
                }
                if let Some(max_age) = query.max_age_days {
                    if b.created_on < now - Duration::days(max_age) {
                        return false;
                    }
                }
                if let Some(min_age) = query.min_age_days {
                    if b.created_on > now - Duration::days(min_age) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        // Secondary key on every non-chronological sort is newest-first,
        // matching the production backend's ordering.
        match query.sort {
            BugSort::Newest => matches.sort_by(|a, b| b.created_on.cmp(&a.created_on)),
            BugSort::Oldest => matches.sort_by(|a, b| a.created_on.cmp(&b.created_on)),
            BugSort::Title => matches.sort_by(|a, b| {
                a.title.cmp(&b.title).then(b.created_on.cmp(&a.created_on))
            }),
            BugSort::Classification => matches.sort_by(|a, b| {
                a.classification
                    .cmp(&b.classification)
                    .then(b.created_on.cmp(&a.created_on))
            }),
            BugSort::AssignedTo => matches.sort_by(|a, b| {
                let aa = a.assigned_to.map(|id| id.to_string()).unwrap_or_default();
                let ab = b.assigned_to.map(|id| id.to_string()).unwrap_or_default();
                aa.cmp(&ab).then(b.created_on.cmp(&a.created_on))
            }),
            BugSort::CreatedBy => matches.sort_by(|a, b| {
                a.created_by
                    .to_string()
                    .cmp(&b.created_by.to_string())
                    .then(b.created_on.cmp(&a.created_on))
            }),
        }

        let skip = (query.page_number.max(1) as usize - 1) * query.page_size as usize;
        Ok(matches
            .into_iter()
            .skip(skip)
            .take(query.page_size as usize)
            .collect())
    }

    async fn insert(&self, bug: &Bug, edit: &EditRecord) -> Result<(), StoreError> {
        let mut bugs = self.bugs.write().map_err(|_| poisoned())?;
        bugs.insert(bug.id, bug.clone());
        drop(bugs);
        self.push_edit(edit)
    }

    async fn update(&self, bug: &Bug, edit: &EditRecord) -> Result<(), StoreError> {
        let mut bugs = self.bugs.write().map_err(|_| poisoned())?;
        if !bugs.contains_key(&bug.id) {
            return Err(StoreError::NotFound);
        }
        bugs.insert(bug.id, bug.clone());
        drop(bugs);
        self.push_edit(edit)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<RoleGrants>, StoreError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles.get(name).cloned())
    }

    async fn find_many(&self, names: &[Role]) -> Result<Vec<RoleGrants>, StoreError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(names
            .iter()
            .filter_map(|name| roles.get(name.as_str()).cloned())
            .collect())
    }
}

#[async_trait]
impl EditLog for InMemoryStore {
    async fn append(&self, record: &EditRecord) -> Result<(), StoreError> {
        self.push_edit(record)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<EditRecord>, StoreError> {
        let edits = self.edits.read().map_err(|_| poisoned())?;
        Ok(edits.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugtrackd_audit::{Actor, EditOp, EditTarget, BUGS_COLLECTION, USER_COLLECTION};
    use bugtrackd_users::NewUser;
    use serde_json::json;

    fn user(email: &str, role: &str) -> User {
        let input = NewUser {
            email: email.to_string(),
            password: "hunter22".to_string(),
            given_name: email.split('@').next().unwrap().to_string(),
            family_name: "Tester".to_string(),
            role: role.to_string(),
        };
        User::register(UserId::new(), &input, "hash".to_string(), Utc::now())
    }

    fn insert_edit(u: &User) -> EditRecord {
        EditRecord::new(
            USER_COLLECTION,
            EditOp::Insert,
            EditTarget::user(u.id),
            json!({}),
            None,
            Utc::now(),
        )
    }

    fn bug(title: &str, creator: UserId) -> Bug {
        Bug::report(
            BugId::new(),
            title.to_string(),
            "description".to_string(),
            "bug".to_string(),
            creator,
            "tester".to_string(),
            Utc::now(),
        )
    }

    fn bug_edit(b: &Bug, op: EditOp) -> EditRecord {
        EditRecord::new(
            BUGS_COLLECTION,
            op,
            EditTarget::bug(b.id),
            json!({}),
            Some(Actor {
                user_id: b.created_by,
                email: "tester@example.com".to_string(),
                roles: vec![Role::new("Developer")],
            }),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_email_rejected_and_original_untouched() {
        let store = InMemoryStore::new();
        let first = user("alice@example.com", "Developer");
        UserStore::insert(&store, &first, &insert_edit(&first)).await.unwrap();

        let mut second = user("alice@example.com", "Quality Analyst");
        second.given_name = "Imposter".to_string();
        let err = UserStore::insert(&store, &second, &insert_edit(&second))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        let stored = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.given_name, "alice");

        // Only the successful insert left an audit record.
        assert_eq!(EditLog::recent(&store, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_mutation_appends_exactly_one_edit() {
        let store = InMemoryStore::new();
        let creator = UserId::new();
        let mut b = bug("Crash", creator);

        BugStore::insert(&store, &b, &bug_edit(&b, EditOp::Insert)).await.unwrap();
        b.set_closed(true, creator, Utc::now());
        BugStore::update(&store, &b, &bug_edit(&b, EditOp::Update)).await.unwrap();

        let edits = EditLog::recent(&store, 10).await.unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].op, EditOp::Update);
        assert_eq!(edits[0].target.bug_id, Some(b.id));
        assert_eq!(edits[1].op, EditOp::Insert);
    }

    #[tokio::test]
    async fn update_replaces_whole_document_last_write_wins() {
        let store = InMemoryStore::new();
        let creator = UserId::new();
        let b = bug("Crash", creator);
        BugStore::insert(&store, &b, &bug_edit(&b, EditOp::Insert)).await.unwrap();

        let mut writer_a = b.clone();
        writer_a.title = "Crash on save".to_string();
        let mut writer_b = b.clone();
        writer_b.title = "Crash on load".to_string();

        BugStore::update(&store, &writer_a, &bug_edit(&writer_a, EditOp::Update)).await.unwrap();
        BugStore::update(&store, &writer_b, &bug_edit(&writer_b, EditOp::Update)).await.unwrap();

        let stored = BugStore::find_by_id(&store, b.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Crash on load");
    }

    #[tokio::test]
    async fn bug_list_filters_and_pages() {
        let store = InMemoryStore::new();
        let creator = UserId::new();

        for i in 0..12 {
            let mut b = bug(&format!("Bug {i:02}"), creator);
            if i % 2 == 0 {
                b.set_closed(true, creator, Utc::now());
            }
            BugStore::insert(&store, &b, &bug_edit(&b, EditOp::Insert)).await.unwrap();
        }

        let open = BugStore::list(
            &store,
            &BugQuery {
                closed: Some(false),
                page_size: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(open.len(), 6);
        assert!(open.iter().all(|b| !b.closed));

        let page = BugStore::list(
            &store,
            &BugQuery {
                sort: BugSort::Title,
                page_size: 9,
                page_number: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].title, "Bug 09");

        let kw = BugStore::list(
            &store,
            &BugQuery {
                keywords: Some("bug 03".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(kw.len(), 1);
    }

    #[tokio::test]
    async fn user_list_filters_by_role_and_sorts() {
        let store = InMemoryStore::new();
        for (email, role) in [
            ("carol@example.com", "Developer"),
            ("alice@example.com", "Quality Analyst"),
            ("bob@example.com", "Developer"),
        ] {
            let u = user(email, role);
            UserStore::insert(&store, &u, &insert_edit(&u)).await.unwrap();
        }

        let devs = UserStore::list(
            &store,
            &UserQuery {
                role: Some("Developer".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(devs.len(), 2);
        assert_eq!(devs[0].given_name, "bob");
        assert_eq!(devs[1].given_name, "carol");
    }

    #[tokio::test]
    async fn seeded_roles_resolve_and_unknown_names_drop_out() {
        let store = InMemoryStore::with_default_roles();

        let grants = store
            .find_many(&[Role::new("Developer"), Role::new("Ghost")])
            .await
            .unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].permissions.allows_name("canEditMyBug"));

        assert!(store.find_by_name("Ghost").await.unwrap().is_none());
    }
}
