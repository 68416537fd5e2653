//! Local filesystem key-value store.
//!
//! Each key is stored as a file (relative to the configured root directory)
//! and accessed using `tokio::fs` for async I/O.

use crate::error::{ErrorKind, Result};
use crate::{KeyValueStore, validate_key};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem key-value store.
///
/// Values are written to a hidden sibling file first and renamed into place,
/// so a crash mid-write never leaves a truncated value behind.
///
/// # Examples
///
/// ```no_run
/// use stocktag_storage::backend::LocalStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStore::new("local", "/home/me/.local/share/stocktag")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalStore {
    name: String,
    /// Root directory for stored values
    root: PathBuf,
}
impl LocalStore {
    /// Create a new local filesystem store.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root));
            }
        } else {
            // Use non-async here; it'll only happen once on initialization
            // and it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a key.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let validated = validate_key(key)?;
        Ok(self.root.join(validated))
    }

    /// Hidden sibling used for the write-then-rename dance. Validated keys can
    /// never start with a dot, so this never collides with a real key.
    fn partial_path(path: &Path) -> PathBuf {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        path.with_file_name(format!(".{name}.partial"))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl KeyValueStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.absolute_path(key)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.absolute_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_io_error(e, &path).into()),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.absolute_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        let partial = Self::partial_path(&path);
        fs::write(&partial, value).await.map_err(|e| Self::map_io_error(e, &partial))?;
        if let Err(e) = fs::rename(&partial, &path).await {
            // Don't leave the partial file lying around; the original error is what matters.
            _ = fs::remove_file(&partial).await;
            exn::bail!(Self::map_io_error(e, &path));
        }
        tracing::trace!(store = %self.name, key, bytes = value.len(), "Value written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.absolute_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e, &path).into()),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalStore::new("name", temp_dir.path()).is_ok());
        assert!(LocalStore::new("name", "relative/path").is_err());
        assert!(LocalStore::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/store");
        LocalStore::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"data").unwrap();
        let err = LocalStore::new("name", &file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new("name", temp_dir.path()).unwrap();
        store.put("batch-progress", b"{\"a\":1}").await.unwrap();
        assert_eq!(store.get("batch-progress").await.unwrap().unwrap(), b"{\"a\":1}");
        // Overwrite
        store.put("batch-progress", b"{}").await.unwrap();
        assert_eq!(store.get("batch-progress").await.unwrap().unwrap(), b"{}");
        // No partial file left behind
        assert!(!temp_dir.path().join(".batch-progress.partial").exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new("name", temp_dir.path()).unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new("name", temp_dir.path()).unwrap();
        store.put("key", b"data").await.unwrap();
        assert!(store.exists("key").await.unwrap());
        store.delete("key").await.unwrap();
        assert!(!store.exists("key").await.unwrap());
        store.delete("key").await.unwrap();
    }

    #[tokio::test]
    async fn test_nested_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new("name", temp_dir.path()).unwrap();
        store.put("profiles/work/progress", b"1").await.unwrap();
        store.put("progress", b"2").await.unwrap();
        assert_eq!(store.get("profiles/work/progress").await.unwrap().unwrap(), b"1");
        assert_eq!(store.get("progress").await.unwrap().unwrap(), b"2");
        assert!(temp_dir.path().join("profiles/work/progress").is_file());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new("name", temp_dir.path()).unwrap();
        assert!(store.put("../escape", b"bad").await.is_err());
        assert!(store.get("../escape").await.is_err());
    }
}
