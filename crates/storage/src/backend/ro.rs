//! Read-only key-value store.
//!
//! Wraps another store and prevents write operations from executing, but
//! indicates success on return.

use crate::error::Result;
use crate::{KeyValueStore, StoreHandle};
use async_trait::async_trait;

/// Read-only key-value store.
///
/// Wraps another store and silently drops all write operations, logging an
/// [`info event`](tracing::Event). Used by commands that inspect persisted
/// progress and must never modify it.
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: StoreHandle,
}
impl ReadOnlyStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        tracing::info!(key, bytes = value.len(), "Skipping write during read-only mode");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        tracing::info!(key, "Skipping delete during read-only mode");
        Ok(())
    }
}
