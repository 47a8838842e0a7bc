//! `bugtrackd-infra` — persistence for users, bugs, roles, and the audit
//! trail.
//!
//! The store contracts live in [`store`]; two backends implement them: an
//! in-memory store for tests/dev and a Postgres JSONB store for production.

pub mod store;

pub use store::in_memory::InMemoryStore;
pub use store::postgres::PostgresStore;
pub use store::r#trait::{
    BugQuery, BugSort, BugStore, EditLog, RoleStore, StoreError, UserQuery, UserSort, UserStore,
};
