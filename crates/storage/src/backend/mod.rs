//! Key-value store trait and implementations.

mod local;
#[cfg(feature = "mock")]
mod memory;
mod ro;

pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::memory::MemoryStore;
pub use self::ro::ReadOnlyStore;
use crate::error::Result;
use async_trait::async_trait;

/// Unified interface for durable key-value stores.
///
/// Values are opaque bytes; callers own the serialization format. All keys
/// must be validated using [`validate_key`](crate::validate_key) before use,
/// and implementations are expected to enforce this.
///
/// # Examples
///
/// ```
/// use stocktag_storage::{KeyValueStore, error::Result};
///
/// async fn size_of_progress(store: &dyn KeyValueStore) -> Result<usize> {
///     Ok(store.get("batch-progress").await?.map(|v| v.len()).unwrap_or(0))
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Check if a key holds a value.
    ///
    /// Default implementation fetches the whole value; backends that can
    /// answer more cheaply should override it.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Fetch the value stored under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Implementations should make the replacement atomic: a reader never
    /// observes a partially written value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove the value stored under `key`. Removing a key that holds nothing
    /// is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
