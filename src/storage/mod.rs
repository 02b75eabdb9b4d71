//! # Storage Layer
//!
//! PostgreSQL-backed persistence for the account service. Repositories are
//! trait objects so business logic can be exercised against in-memory
//! substitutes.

pub mod repositories;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::{Error, Result};

/// Shared database pool type
pub type DbPool = sqlx::PgPool;

/// Create a connection pool from database configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
        .connect(&config.url)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to connect to database".to_string(),
        })?;

    info!(max_connections = config.max_connections, "database pool created");
    Ok(pool)
}

/// Apply pending SQL migrations from the `migrations/` directory
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|err| Error::internal(format!("Migration failed: {}", err)))?;

    info!("database migrations applied");
    Ok(())
}
