use axum::async_trait;
use sqlx::{error::ErrorKind, PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    auth::password::{hash_password, HashError},
    users::repo_types::{NewUser, ProfilePatch, User},
};

/// Closed set of failures a store may report; engine errors never cross this boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate user entry")]
    DuplicateEntry,
    #[error("foreign key violation (invalid user reference?)")]
    ForeignKeyViolation,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Hashing(#[from] HashError),
    #[error("{0}")]
    Storage(String),
}

/// Persistence contract for user records. Every operation ignores soft-deleted rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Hashes `new.password` and inserts the row; the returned user carries the stored timestamps.
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    /// Looks up by id when `key` parses as a UUID, by email otherwise.
    async fn get_user_by_id_or_email(&self, key: &str) -> Result<User, StoreError>;

    /// Overwrites firstname, lastname, username and email of the row with `user.id`.
    async fn update_user(&self, user: &User) -> Result<User, StoreError>;

    /// Locks the row, merges `patch` into it and writes it back in one transaction.
    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<User, StoreError>;

    async fn update_password(&self, id: Uuid, new_password: &str) -> Result<User, StoreError>;

    /// On `Err` callers must assume the name is taken.
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_profile(
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET firstname = $1, lastname = $2, username = $3, email = $4, updated_at = NOW()
             WHERE id = $5 AND deleted_at IS NULL
            RETURNING id, firstname, lastname, username, email, password_hash,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_db_error("write_profile", e))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let password_hash = hash_password(&new.password)?;

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, firstname, lastname, username, email, password_hash,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING id, firstname, lastname, username, email, password_hash,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(new.id)
        .bind(&new.firstname)
        .bind(&new.lastname)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("create_user", e))
    }

    async fn get_user_by_id_or_email(&self, key: &str) -> Result<User, StoreError> {
        let query = match Uuid::parse_str(key) {
            Ok(id) => sqlx::query_as::<_, User>(
                r#"
                SELECT id, firstname, lastname, username, email, password_hash,
                       created_at, updated_at, deleted_at
                  FROM users
                 WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id),
            Err(_) => sqlx::query_as::<_, User>(
                r#"
                SELECT id, firstname, lastname, username, email, password_hash,
                       created_at, updated_at, deleted_at
                  FROM users
                 WHERE email = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(key),
        };

        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("get_user_by_id_or_email", e))
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("update_user", e))?;
        let updated = Self::write_profile(&mut tx, user).await?;
        tx.commit()
            .await
            .map_err(|e| map_db_error("update_user", e))?;
        Ok(updated)
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("update_profile", e))?;

        let mut user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, firstname, lastname, username, email, password_hash,
                   created_at, updated_at, deleted_at
              FROM users
             WHERE id = $1 AND deleted_at IS NULL
               FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error("update_profile", e))?;

        patch.apply(&mut user);
        let updated = Self::write_profile(&mut tx, &user).await?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("update_profile", e))?;
        Ok(updated)
    }

    async fn update_password(&self, id: Uuid, new_password: &str) -> Result<User, StoreError> {
        let password_hash = hash_password(new_password)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("update_password", e))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET password_hash = $1, updated_at = NOW()
             WHERE id = $2 AND deleted_at IS NULL
            RETURNING id, firstname, lastname, username, email, password_hash,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(&password_hash)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error("update_password", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("update_password", e))?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("username_exists", e))
    }
}

fn map_db_error(method: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => {
            debug!(method, "no matching user row");
            StoreError::NotFound
        }
        sqlx::Error::Database(db_err) => match classify(db_err.kind()) {
            Some(kind) => {
                debug!(method, code = ?db_err.code(), error = %db_err, "constraint violation");
                kind
            }
            None => {
                error!(method, code = ?db_err.code(), error = %db_err, "database operation failed");
                StoreError::Storage(format!("database error: {}", db_err))
            }
        },
        other => {
            error!(method, error = %other, "database operation failed");
            StoreError::Storage(format!("database error: {}", other))
        }
    }
}

fn classify(kind: ErrorKind) -> Option<StoreError> {
    match kind {
        ErrorKind::UniqueViolation => Some(StoreError::DuplicateEntry),
        ErrorKind::ForeignKeyViolation => Some(StoreError::ForeignKeyViolation),
        _ => None,
    }
}
