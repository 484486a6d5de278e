//! User system-of-record

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;

use super::model::{EMAIL_TAKEN, NewUser, User, UserChanges};
use crate::db::{Database, is_unique_violation};
use crate::services::ServiceError;
use crate::services::memory::MemoryTable;

pub const SCHEMA: &[&str] = &[r#"CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    full_name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#];

#[async_trait]
pub trait UserStore: Send + Sync + fmt::Debug {
    /// Whether the system-of-record is reachable
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, ServiceError>;

    async fn get(&self, id: i64) -> Result<Option<User>, ServiceError>;

    /// Fails with `Duplicate` when the email is taken
    async fn create(&self, user: NewUser) -> Result<User, ServiceError>;

    /// `None` when the user does not exist
    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, ServiceError>;

    /// Returns the removed row
    async fn delete(&self, id: i64) -> Result<Option<User>, ServiceError>;
}

fn map_write_error(err: sqlx::Error) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::Duplicate(EMAIL_TAKEN)
    } else {
        ServiceError::Database(err)
    }
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: Database,
}

impl PgUserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.db.health_check().await?)
    }

    async fn list(&self) -> Result<Vec<User>, ServiceError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(users)
    }

    async fn get(&self, id: i64) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (email, full_name) VALUES ($1, $2)
               RETURNING id, email, full_name, created_at, updated_at"#,
        )
        .bind(&user.email)
        .bind(&user.full_name)
        .fetch_one(self.db.pool())
        .await
        .map_err(map_write_error)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET email = COALESCE($2, email),
                   full_name = COALESCE($3, full_name),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, email, full_name, created_at, updated_at"#,
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.full_name)
        .fetch_optional(self.db.pool())
        .await
        .map_err(map_write_error)
    }

    async fn delete(&self, id: i64) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            r#"DELETE FROM users WHERE id = $1
               RETURNING id, email, full_name, created_at, updated_at"#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    table: MemoryTable<User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.table.lock().rows.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut table = self.table.lock();
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(ServiceError::Duplicate(EMAIL_TAKEN));
        }
        let now = Utc::now();
        let id = table.allocate_id();
        let user = User {
            id,
            email: user.email,
            full_name: user.full_name,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, ServiceError> {
        let mut table = self.table.lock();
        if let Some(email) = &changes.email {
            if table.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(ServiceError::Duplicate(EMAIL_TAKEN));
            }
        }
        let Some(user) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.table.lock().rows.remove(&id))
    }
}
