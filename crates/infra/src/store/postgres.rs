//! Postgres-backed document store.
//!
//! Each collection is one table of JSONB documents keyed by id; the email
//! uniqueness invariant and the keyword search indexes live in the schema.
//! Every mutating method commits the document write and its audit record in
//! a single transaction (both-or-neither): a success response implies the
//! edit record exists.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use bugtrackd_audit::EditRecord;
use bugtrackd_auth::{Role, RoleGrants, default_role_grants};
use bugtrackd_bugs::Bug;
use bugtrackd_core::{BugId, UserId};
use bugtrackd_users::User;

use super::r#trait::{
    BugQuery, BugSort, BugStore, EditLog, RoleStore, StoreError, UserQuery, UserSort, UserStore,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        doc JSONB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS users_text_idx ON users USING GIN (
        to_tsvector('english',
            coalesce(doc->>'given_name','') || ' ' ||
            coalesce(doc->>'family_name','') || ' ' ||
            coalesce(doc->>'email',''))
    )",
    "CREATE TABLE IF NOT EXISTS bugs (
        id UUID PRIMARY KEY,
        doc JSONB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS bugs_text_idx ON bugs USING GIN (
        to_tsvector('english',
            coalesce(doc->>'title','') || ' ' ||
            coalesce(doc->>'description',''))
    )",
    "CREATE TABLE IF NOT EXISTS edits (
        id UUID PRIMARY KEY,
        doc JSONB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS roles (
        name TEXT PRIMARY KEY,
        doc JSONB NOT NULL
    )",
];

pub struct PostgresStore {
    pool: PgPool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn map_insert_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::DuplicateEmail;
        }
    }
    backend(e)
}

async fn append_edit_tx(
    tx: &mut Transaction<'_, Postgres>,
    edit: &EditRecord,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO edits (id, doc) VALUES ($1, $2)")
        .bind(edit.id.as_uuid())
        .bind(Json(edit))
        .execute(&mut **tx)
        .await
        .map_err(backend)?;
    Ok(())
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables/indexes and seed the default role registry.
    ///
    /// Idempotent; runs at process start.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }

        for grant in default_role_grants() {
            sqlx::query("INSERT INTO roles (name, doc) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
                .bind(&grant.name)
                .bind(Json(&grant))
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }

        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT doc FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| r.try_get::<Json<User>, _>("doc").map(|j| j.0))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT doc FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| r.try_get::<Json<User>, _>("doc").map(|j| j.0))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn list(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT doc FROM users WHERE TRUE");

        if let Some(kw) = &query.keywords {
            qb.push(
                " AND to_tsvector('english', \
                     coalesce(doc->>'given_name','') || ' ' || \
                     coalesce(doc->>'family_name','') || ' ' || \
                     coalesce(doc->>'email','')) @@ plainto_tsquery('english', ",
            );
            qb.push_bind(kw);
            qb.push(")");
        }
        if let Some(role) = &query.role {
            qb.push(" AND doc->'roles' ? ");
            qb.push_bind(role);
        }
        if let Some(max_age) = query.max_age_days {
            qb.push(" AND (doc->>'created_on')::timestamptz >= now() - make_interval(days => ");
            qb.push_bind(max_age as i32);
            qb.push(")");
        }
        if let Some(min_age) = query.min_age_days {
            qb.push(" AND (doc->>'created_on')::timestamptz <= now() - make_interval(days => ");
            qb.push_bind(min_age as i32);
            qb.push(")");
        }

        qb.push(match query.sort {
            UserSort::GivenName => " ORDER BY doc->>'given_name' ASC",
            UserSort::FamilyName => " ORDER BY doc->>'family_name' ASC",
            UserSort::Role => " ORDER BY doc->'roles'->>0 ASC",
            UserSort::Newest => " ORDER BY (doc->>'created_on')::timestamptz DESC",
            UserSort::Oldest => " ORDER BY (doc->>'created_on')::timestamptz ASC",
        });

        let rows = qb.build().fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter()
            .map(|r| {
                r.try_get::<Json<User>, _>("doc")
                    .map(|j| j.0)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn insert(&self, user: &User, edit: &EditRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("INSERT INTO users (id, email, doc) VALUES ($1, $2, $3)")
            .bind(user.id.as_uuid())
            .bind(&user.email)
            .bind(Json(user))
            .execute(&mut *tx)
            .await
            .map_err(map_insert_err)?;

        append_edit_tx(&mut tx, edit).await?;
        tx.commit().await.map_err(backend)
    }

    async fn update(&self, user: &User, edit: &EditRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query("UPDATE users SET email = $2, doc = $3 WHERE id = $1")
            .bind(user.id.as_uuid())
            .bind(&user.email)
            .bind(Json(user))
            .execute(&mut *tx)
            .await
            .map_err(map_insert_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        append_edit_tx(&mut tx, edit).await?;
        tx.commit().await.map_err(backend)
    }

    async fn delete(&self, id: UserId, edit: &EditRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        append_edit_tx(&mut tx, edit).await?;
        tx.commit().await.map_err(backend)
    }
}

#[async_trait]
impl BugStore for PostgresStore {
    async fn find_by_id(&self, id: BugId) -> Result<Option<Bug>, StoreError> {
        let row = sqlx::query("SELECT doc FROM bugs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| r.try_get::<Json<Bug>, _>("doc").map(|j| j.0))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn list(&self, query: &BugQuery) -> Result<Vec<Bug>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT doc FROM bugs WHERE TRUE");

        if let Some(kw) = &query.keywords {
            qb.push(
                " AND to_tsvector('english', \
                     coalesce(doc->>'title','') || ' ' || \
                     coalesce(doc->>'description','')) @@ plainto_tsquery('english', ",
            );
            qb.push_bind(kw);
            qb.push(")");
        }
        if let Some(classification) = &query.classification {
            qb.push(" AND doc->>'classification' = ");
            qb.push_bind(classification);
        }
        if let Some(closed) = query.closed {
            qb.push(" AND (doc->>'closed')::boolean = ");
            qb.push_bind(closed);
        }
        if let Some(max_age) = query.max_age_days {
            qb.push(" AND (doc->>'created_on')::timestamptz >= now() - make_interval(days => ");
            qb.push_bind(max_age as i32);
            qb.push(")");
        }
        if let Some(min_age) = query.min_age_days {
            qb.push(" AND (doc->>'created_on')::timestamptz <= now() - make_interval(days => ");
            qb.push_bind(min_age as i32);
            qb.push(")");
        }

        qb.push(match query.sort {
            BugSort::Newest => " ORDER BY (doc->>'created_on')::timestamptz DESC",
            BugSort::Oldest => " ORDER BY (doc->>'created_on')::timestamptz ASC",
            BugSort::Title => {
                " ORDER BY doc->>'title' ASC, (doc->>'created_on')::timestamptz DESC"
            }
            BugSort::Classification => {
                " ORDER BY doc->>'classification' ASC, (doc->>'created_on')::timestamptz DESC"
            }
            BugSort::AssignedTo => {
                " ORDER BY doc->>'assigned_to' ASC, (doc->>'created_on')::timestamptz DESC"
            }
            BugSort::CreatedBy => {
                " ORDER BY doc->>'created_by' ASC, (doc->>'created_on')::timestamptz DESC"
            }
        });

        let page_size = i64::from(query.page_size);
        let offset = i64::from(query.page_number.max(1) - 1) * page_size;
        qb.push(" LIMIT ");
        qb.push_bind(page_size);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter()
            .map(|r| {
                r.try_get::<Json<Bug>, _>("doc")
                    .map(|j| j.0)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn insert(&self, bug: &Bug, edit: &EditRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("INSERT INTO bugs (id, doc) VALUES ($1, $2)")
            .bind(bug.id.as_uuid())
            .bind(Json(bug))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        append_edit_tx(&mut tx, edit).await?;
        tx.commit().await.map_err(backend)
    }

    async fn update(&self, bug: &Bug, edit: &EditRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query("UPDATE bugs SET doc = $2 WHERE id = $1")
            .bind(bug.id.as_uuid())
            .bind(Json(bug))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        append_edit_tx(&mut tx, edit).await?;
        tx.commit().await.map_err(backend)
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<RoleGrants>, StoreError> {
        let row = sqlx::query("SELECT doc FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| r.try_get::<Json<RoleGrants>, _>("doc").map(|j| j.0))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn find_many(&self, names: &[Role]) -> Result<Vec<RoleGrants>, StoreError> {
        let names: Vec<String> = names.iter().map(|r| r.as_str().to_string()).collect();

        let rows = sqlx::query("SELECT doc FROM roles WHERE name = ANY($1)")
            .bind(&names)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter()
            .map(|r| {
                r.try_get::<Json<RoleGrants>, _>("doc")
                    .map(|j| j.0)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl EditLog for PostgresStore {
    async fn append(&self, record: &EditRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO edits (id, doc) VALUES ($1, $2)")
            .bind(record.id.as_uuid())
            .bind(Json(record))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<EditRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM edits ORDER BY (doc->>'timestamp')::timestamptz DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|r| {
                r.try_get::<Json<EditRecord>, _>("doc")
                    .map(|j| j.0)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }
}
