//! Role repository: role records and user-role assignments.

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;

/// Role store contract. Creation and assignment are idempotent so that
/// concurrent first-assignment races resolve to a single row.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Create the role if it does not exist yet. Safe to call concurrently.
    async fn ensure_role(&self, name: &str) -> Result<()>;

    /// Whether a role with this name exists
    async fn role_exists(&self, name: &str) -> Result<bool>;

    /// Assign a role to a user. A repeated assignment is a no-op.
    async fn assign_role(&self, user_id: &UserId, role: &str) -> Result<()>;

    /// List the role names assigned to a user
    async fn list_user_roles(&self, user_id: &UserId) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct SqlxRoleRepository {
    pool: DbPool,
}

impl SqlxRoleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    #[instrument(skip(self), fields(role = %name), name = "db_ensure_role")]
    async fn ensure_role(&self, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO roles (name, created_at) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to ensure role".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(role = %name), name = "db_role_exists")]
    async fn role_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to check role existence".to_string(),
            })?;

        Ok(count > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id, role = %role), name = "db_assign_role")]
    async fn assign_role(&self, user_id: &UserId, role: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, role_name) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(role)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to assign role".to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_list_user_roles")]
    async fn list_user_roles(&self, user_id: &UserId) -> Result<Vec<String>> {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY role_name",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to list user roles".to_string(),
        })?;

        Ok(roles)
    }
}
