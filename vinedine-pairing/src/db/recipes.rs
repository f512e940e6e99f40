//! Append-only store of composite records
//!
//! One flat table, five TEXT columns, no key. Rows are only ever appended and
//! read back in insertion order.

use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::CompositeRecord;
use crate::utils::{retry_with_backoff, RetryPolicy, Retryable};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Retryable for StorageError {
    fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(e) => e.to_string().contains("database is locked"),
        }
    }
}

/// Handle on the `recipes` table
///
/// Clones share the pool and the write gate, so appends from any clone are
/// serialized.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
    policy: RetryPolicy,
}

impl RecordStore {
    pub fn new(pool: SqlitePool, policy: RetryPolicy) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
            policy,
        }
    }

    /// Open the store, creating the table if it does not exist yet
    pub async fn open(pool: SqlitePool, policy: RetryPolicy) -> Result<Self, StorageError> {
        let store = Self::new(pool, policy);
        store.create_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent table creation
    pub async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recipes (
                recipe_title TEXT,
                recipe TEXT,
                song_name TEXT,
                artist TEXT,
                song_url TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one record
    pub async fn append(&self, record: &CompositeRecord) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;

        retry_with_backoff("record append", &self.policy, || async {
            sqlx::query(
                r#"
                INSERT INTO recipes (recipe_title, recipe, song_name, artist, song_url)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.recipe_title)
            .bind(&record.recipe_body)
            .bind(&record.song_name)
            .bind(&record.artist_name)
            .bind(&record.song_url)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await?;

        debug!(title = ?record.recipe_title, "Record appended");
        Ok(())
    }

    /// Every record, oldest first
    pub async fn list_all(&self) -> Result<Vec<CompositeRecord>, StorageError> {
        let records = sqlx::query_as::<_, CompositeRecord>(
            r#"
            SELECT recipe_title, COALESCE(recipe, '') AS recipe, song_name, artist, song_url
            FROM recipes
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
