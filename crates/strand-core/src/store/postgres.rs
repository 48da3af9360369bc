//! PostgreSQL-backed implementation of [`LogStore`].

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::StoreError;

use super::{LogStore, WriteOutcome, escape_like};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// PostgreSQL-backed log store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from an existing pool.
    ///
    /// The caller is responsible for running migrations on the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to a PostgreSQL database by URL and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection {
                details: format!("failed to connect to PostgreSQL: {}", e),
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
impl LogStore for PostgresStore {
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO journal (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(WriteOutcome::Written);
        }

        let existing: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM journal WHERE key = $1")
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
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM journal WHERE key = $1")
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
            WHERE key LIKE $1 ESCAPE '\'
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
