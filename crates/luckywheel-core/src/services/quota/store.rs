//! Quota storage layer
//!
//! Persists tracker keys to the SQLite `kv_store` table.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use super::provider::{QuotaStorage, StorageError};

// ============================================================================
// Database Row Types
// ============================================================================

/// Database row representation of a stored key
#[derive(Debug, Clone, FromRow)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    /// Last write time (SQLite `CURRENT_TIMESTAMP` format)
    pub updated_at: String,
}

// ============================================================================
// SqliteStorage
// ============================================================================

/// Durable storage backed by SQLite
///
/// `set_many` runs in one transaction, so the quota document and its reset
/// date are never observed half-written.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List stored entries whose key starts with `prefix`
    pub async fn list(&self, prefix: &str) -> Result<Vec<StoredEntry>, StorageError> {
        let pattern = format!("{}%", escape_like(prefix));
        let rows = sqlx::query_as::<_, StoredEntry>(
            r#"
            SELECT key, value, CAST(updated_at AS TEXT) AS updated_at
            FROM kv_store
            WHERE key LIKE ? ESCAPE '\'
            ORDER BY key ASC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        log::debug!("[quota:store] Found {} entries under '{}'", rows.len(), prefix);
        Ok(rows)
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[async_trait]
impl QuotaStorage for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        log::debug!("[quota:store] Wrote key {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        log::debug!(
            "[quota:store] Removed key {} ({} rows)",
            key,
            result.rows_affected()
        );
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES (?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        log::debug!("[quota:store] Wrote {} keys in one transaction", entries.len());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
