//! User repository: the credential store behind the account orchestrator.
//!
//! Password hashing and verification live behind this boundary so the
//! comparison strategy (Argon2, constant-time) is a store property rather
//! than something each caller re-implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use crate::auth::hashing;
use crate::auth::user::{NewUser, User};
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub email_confirmed: bool,
    pub security_stamp: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_string(row.id),
            email: row.email,
            username: row.username,
            phone: row.phone,
            email_confirmed: row.email_confirmed,
            security_stamp: row.security_stamp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Credential store contract. All expected business failures come back as
/// typed errors; none of these methods panic on bad input.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user with the given password. Fails with `Conflict`
    /// when the email is already taken; stores that enforce their own
    /// policies report those rejections as `Store`.
    async fn create_user(&self, user: NewUser, password: &str) -> Result<User>;

    /// Look up a user by id
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// Look up a user by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist the mutable fields of a user record (username, phone,
    /// email_confirmed, security_stamp). Last writer wins.
    async fn update_user(&self, user: &User) -> Result<User>;

    /// Verify a candidate password against the stored hash. Returns false
    /// when the password does not match or the account has no password set.
    async fn verify_password(&self, id: &UserId, candidate: &str) -> Result<bool>;

    /// Whether the account has a password hash at all (external-login-only
    /// accounts do not).
    async fn has_password(&self, id: &UserId) -> Result<bool>;

    /// Replace the password hash and security stamp in one write.
    async fn set_password(
        &self,
        id: &UserId,
        new_password: &str,
        security_stamp: &str,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn password_hash(&self, id: &UserId) -> Result<Option<String>> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| Error::Database {
                    source: err,
                    context: "Failed to fetch password hash".to_string(),
                })?;

        match hash {
            Some(hash) => Ok(hash),
            None => Err(Error::not_found("user", id.as_str())),
        }
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    #[instrument(skip(self, user, password), fields(user_id = %user.id, user_email = %user.email), name = "db_create_user")]
    async fn create_user(&self, user: NewUser, password: &str) -> Result<User> {
        let password_hash = hashing::hash_password(password)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, phone, password_hash, email_confirmed, security_stamp, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.phone)
        .bind(&password_hash)
        .bind(user.email_confirmed)
        .bind(&user.security_stamp)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if err.as_database_error().map(|e| e.is_unique_violation()).unwrap_or(false) {
                Error::conflict(format!("Email '{}' is already registered", user.email), "user")
            } else {
                Error::Database { source: err, context: "Failed to create user".to_string() }
            }
        })?;

        self.find_by_id(&user.id)
            .await?
            .ok_or_else(|| Error::internal("User not found after creation"))
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_find_user_by_id")]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, phone, email_confirmed, security_stamp, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch user".to_string(),
        })?;

        Ok(row.map(User::from))
    }

    #[instrument(skip(self), fields(user_email = %email), name = "db_find_user_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, phone, email_confirmed, security_stamp, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch user by email".to_string(),
        })?;

        Ok(row.map(User::from))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), name = "db_update_user")]
    async fn update_user(&self, user: &User) -> Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $1, phone = $2, email_confirmed = $3, security_stamp = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&user.username)
        .bind(&user.phone)
        .bind(user.email_confirmed)
        .bind(&user.security_stamp)
        .bind(Utc::now())
        .bind(user.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to update user".to_string(),
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("user", user.id.as_str()));
        }

        self.find_by_id(&user.id)
            .await?
            .ok_or_else(|| Error::internal("User not found after update"))
    }

    #[instrument(skip(self, candidate), fields(user_id = %id), name = "db_verify_password")]
    async fn verify_password(&self, id: &UserId, candidate: &str) -> Result<bool> {
        match self.password_hash(id).await? {
            Some(hash) => hashing::verify_password(candidate, &hash),
            None => Ok(false),
        }
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_has_password")]
    async fn has_password(&self, id: &UserId) -> Result<bool> {
        Ok(self.password_hash(id).await?.is_some())
    }

    #[instrument(skip(self, new_password, security_stamp), fields(user_id = %id), name = "db_set_password")]
    async fn set_password(
        &self,
        id: &UserId,
        new_password: &str,
        security_stamp: &str,
    ) -> Result<()> {
        let password_hash = hashing::hash_password(new_password)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, security_stamp = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(&password_hash)
        .bind(security_stamp)
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to set password".to_string(),
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("user", id.as_str()));
        }

        Ok(())
    }
}
