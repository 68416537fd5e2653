//! [`KeyValueStore`] implementation backed by [`Database`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use stocktag_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use stocktag_storage::{KeyValueStore, validate_key};
use time::UtcDateTime;

/// SQLite-backed key-value store. One row per key.
///
/// Cloning is cheap (the pool is reference counted).
#[derive(Debug, Clone)]
pub struct SqliteStore {
    name: String,
    pool: SqlitePool,
}
impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self::new("sqlite", db.pool().clone())
    }
}
impl SqliteStore {
    pub fn new(name: impl Into<String>, pool: SqlitePool) -> Self {
        Self { name: name.into(), pool }
    }

    async fn get_inner(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(include_str!("../queries/get_value.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(value,)| value))
    }

    async fn put_inner(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(include_str!("../queries/put_value.sql"))
            .bind(key)
            .bind(value)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn delete_inner(&self, key: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_value.sql"))
            .bind(key)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    fn backend_error(&self) -> StorageErrorKind {
        StorageErrorKind::BackendError(format!("sqlite store `{}` failed", self.name))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let key = validate_key(key)?;
        self.get_inner(&key).await.or_raise(|| self.backend_error())
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let key = validate_key(key)?;
        self.put_inner(&key, value).await.or_raise(|| self.backend_error())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = validate_key(key)?;
        self.delete_inner(&key).await.or_raise(|| self.backend_error())
    }
}
