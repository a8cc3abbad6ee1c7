use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Turn a unique-constraint violation into `Conflict` with a caller-chosen message;
    /// every other error passes through untouched.
    pub fn on_unique(err: sqlx::Error, message: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            DatabaseError::Conflict(message.into())
        } else {
            DatabaseError::Sqlx(err)
        }
    }

    /// Map `RowNotFound` to `NotFound` with a readable message
    pub fn on_missing(err: sqlx::Error, message: impl Into<String>) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound(message.into()),
            other => DatabaseError::Sqlx(other),
        }
    }
}

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres reports unique violations as SQLSTATE 23505; some proxies only keep the text.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION) || db_err.message().contains("duplicate key")
        }
        _ => false,
    }
}

/// Lazily created connection pool shared by the whole process
pub struct DatabaseManager;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

impl DatabaseManager {
    /// Get the application pool, connecting on first use
    pub async fn pool() -> Result<PgPool, DatabaseError> {
        let pool = POOL
            .get_or_try_init(|| async {
                let url = Self::database_url()?;
                let settings = &config::config().database;
                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(Duration::from_secs(settings.connection_timeout))
                    .connect(&url)
                    .await?;
                info!("Created database pool ({} max connections)", settings.max_connections);
                Ok::<_, DatabaseError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    fn database_url() -> Result<String, DatabaseError> {
        let raw = std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let url = url::Url::parse(&raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url.into()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close() {
        if let Some(pool) = POOL.get() {
            pool.close().await;
            info!("Closed database pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(matches!(
            DatabaseError::on_unique(sqlx::Error::RowNotFound, "taken"),
            DatabaseError::Sqlx(_)
        ));
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        match DatabaseError::on_missing(sqlx::Error::RowNotFound, "Dog not found") {
            DatabaseError::NotFound(msg) => assert_eq!(msg, "Dog not found"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
