//! SQLite-backed implementation of [`LogStore`].

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::StoreError;

use super::{LogStore, WriteOutcome, escape_like};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed log store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from an existing pool.
    ///
    /// The caller is responsible for running migrations on the pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite store from a file path.
    ///
    /// This convenience constructor handles all setup:
    /// - Creates parent directories if they don't exist
    /// - Creates the database file if it doesn't exist
    /// - Connects to the database with sensible defaults
    /// - Runs all migrations
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = SqliteStore::from_path(".data/strand.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                details: format!("failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    /// Connect to a SQLite database by URL and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection {
                details: format!("failed to connect to SQLite at '{}': {}", url, e),
            })?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Query {
                operation: "migrate".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl LogStore for SqliteStore {
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO journal (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(WriteOutcome::Written);
        }

        // Another writer won; its value is authoritative. Journal values
        // written through put_if_absent are immutable, so the read-back
        // cannot observe a different value than the winning write.
        let existing: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM journal WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(value) => Ok(WriteOutcome::Conflict(value)),
            None => Err(StoreError::Query {
                operation: "put_if_absent".to_string(),
                details: format!("conflicting key '{}' vanished during read-back", key),
            }),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO journal (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value: Option<Vec<u8>> = sqlx::query_scalar("SELECT value FROM journal WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let pattern = format!("{}%", escape_like(prefix));

        let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT key, value
            FROM journal
            WHERE key LIKE ? ESCAPE '\'
            ORDER BY key ASC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
