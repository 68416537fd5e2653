//! In-memory key-value store for testing.

use crate::error::Result;
use crate::{KeyValueStore, validate_key};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory key-value store for testing.
///
/// Values are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation.
///
/// # Examples
///
/// ```
/// use stocktag_storage::KeyValueStore;
/// use stocktag_storage::backend::MemoryStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::with_entries([("batch-progress", b"{}")]);
/// assert!(store.exists("batch-progress").await?);
///
/// store.put("other", b"data...").await?;
/// assert!(store.exists("other").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    storage: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a store pre-populated with entries.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_entries(entries: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (key, value) in entries {
            let Ok(validated) = validate_key(key.as_ref()) else {
                // The panic here is DELIBERATE. MemoryStore is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MemoryStore::with_entries: invalid key {}", key.as_ref());
            };
            map.insert(validated, value.into());
        }
        Self {
            name: "memory".to_string(),
            storage: RwLock::new(map),
        }
    }

    /// Change the name of the store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
impl Default for MemoryStore {
    fn default() -> Self {
        let entries: [(&str, &[u8]); 0] = [];
        Self::with_entries(entries)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.get(&key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.storage.write().await.insert(key, value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        self.storage.write().await.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::default();
        store.put("key", b"hello").await.unwrap();
        assert_eq!(store.get("key").await.unwrap().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_with_entries() {
        let store = MemoryStore::with_entries([("a/one", Vec::from(*b"1")), ("two", Vec::from(*b"2"))]);
        assert!(store.exists("a/one").await.unwrap());
        assert!(store.exists("two").await.unwrap());
        assert!(!store.exists("three").await.unwrap());
        assert_eq!(store.get("a/one").await.unwrap().unwrap(), b"1");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::default();
        store.put("key", b"data").await.unwrap();
        store.delete("key").await.unwrap();
        assert!(store.get("key").await.unwrap().is_none());
        // Deleting again is fine
        store.delete("key").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let store = MemoryStore::default();
        assert!(store.put("../escape", b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid key")]
    fn test_with_entries_panics_on_bad_key() {
        MemoryStore::with_entries([("../escape", Vec::from(*b"bad"))]);
    }
}
