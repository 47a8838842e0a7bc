//! Infrastructure wiring: store handles injected into the router.
//!
//! Stores are constructed here, once, at startup, and passed down as trait
//! objects; handlers never reach for process-global connection state.

use std::sync::Arc;

use sqlx::PgPool;

use bugtrackd_auth::{PermissionSet, Role, merge_permissions};
use bugtrackd_infra::{BugStore, EditLog, InMemoryStore, PostgresStore, RoleStore, StoreError, UserStore};

use crate::config::ApiConfig;

/// Handles to every persistence concern the handlers touch.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<dyn UserStore>,
    pub bugs: Arc<dyn BugStore>,
    pub roles: Arc<dyn RoleStore>,
    pub edits: Arc<dyn EditLog>,
}

impl AppServices {
    /// In-memory backend (dev/test) seeded with the default role registry.
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::with_default_roles());
        Self {
            users: store.clone(),
            bugs: store.clone(),
            roles: store.clone(),
            edits: store,
        }
    }

    /// Postgres backend; runs the idempotent migration before serving.
    pub async fn postgres(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = PostgresStore::new(pool);
        store.migrate().await?;

        let store = Arc::new(store);
        Ok(Self {
            users: store.clone(),
            bugs: store.clone(),
            roles: store.clone(),
            edits: store,
        })
    }

    /// Resolve the effective permissions for a set of held roles.
    ///
    /// Roles missing from the registry contribute nothing.
    pub async fn resolve_permissions(&self, roles: &[Role]) -> Result<PermissionSet, StoreError> {
        let grants = self.roles.find_many(roles).await?;
        Ok(merge_permissions(&grants))
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("using postgres store");
            AppServices::postgres(url).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Ok(AppServices::in_memory())
        }
    }
}
