//! The Persistence Port: snapshots in, snapshots out.
//!
//! The snapshot's JSON shape is the only thing shared with whatever store is
//! underneath.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use stocktag_model::Snapshot;
use stocktag_storage::StoreHandle;
use tracing::instrument;

pub const DEFAULT_KEY: &str = "batch-progress";

/// What a previously persisted snapshot is good for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// Nothing to resume.
    None,
    /// Recent enough to resume automatically.
    Fresh(Snapshot),
    /// Older than [`STALE_AFTER`](stocktag_model::STALE_AFTER); offered for
    /// information only.
    Stale(Snapshot),
}
impl Resume {
    pub fn classify(snapshot: Option<Snapshot>, now: i64) -> Self {
        match snapshot {
            None => Self::None,
            Some(snapshot) if snapshot.is_stale(now) => Self::Stale(snapshot),
            Some(snapshot) => Self::Fresh(snapshot),
        }
    }

    /// The snapshot, only if it may be resumed automatically.
    pub fn into_fresh(self) -> Option<Snapshot> {
        match self {
            Self::Fresh(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::None => None,
            Self::Fresh(snapshot) | Self::Stale(snapshot) => Some(snapshot),
        }
    }
}

/// Saves, loads and clears the snapshot under a single key.
#[derive(Clone)]
pub struct Persistence {
    store: StoreHandle,
    key: String,
}
impl Persistence {
    pub fn new(store: StoreHandle) -> Self {
        Self::with_key(store, DEFAULT_KEY)
    }

    pub fn with_key(store: StoreHandle, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    #[instrument(skip_all, fields(store = self.store.name(), key = %self.key))]
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_vec(snapshot).or_raise(|| ErrorKind::CorruptSnapshot)?;
        self.store.put(&self.key, &json).await.or_raise(|| ErrorKind::Persistence)?;
        tracing::debug!(bytes = json.len(), folder = snapshot.current_folder_index, "Progress snapshot saved");
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<Snapshot>> {
        let Some(bytes) = self.store.get(&self.key).await.or_raise(|| ErrorKind::Persistence)? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::CorruptSnapshot)?;
        Ok(Some(snapshot))
    }

    /// Load and classify against `now` (epoch millis).
    pub async fn resume(&self, now: i64) -> Result<Resume> {
        let resume = Resume::classify(self.load().await?, now);
        if let Resume::Stale(snapshot) = &resume {
            tracing::warn!(
                saved_at = snapshot.saved_at,
                "Persisted progress is older than 24 hours; it will not be resumed automatically"
            );
        }
        Ok(resume)
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.delete(&self.key).await.or_raise(|| ErrorKind::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stocktag_model::{BatchRun, FolderRun, ImageRun, ProcessingMode};
    use stocktag_storage::backend::MemoryStore;

    const HOUR: i64 = 60 * 60 * 1000;

    fn snapshot(saved_at: i64) -> Snapshot {
        let folder = FolderRun::new("f", "/photos/trip", vec![ImageRun::new("a.jpg")]);
        BatchRun::new(ProcessingMode::Parallel, 2, vec![folder]).snapshot(saved_at)
    }

    fn persistence() -> (Persistence, StoreHandle) {
        let store: StoreHandle = Arc::new(MemoryStore::default());
        (Persistence::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let (persistence, _) = persistence();
        assert!(persistence.load().await.unwrap().is_none());
        persistence.save(&snapshot(1_000)).await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), Some(snapshot(1_000)));
        persistence.clear().await.unwrap();
        assert!(persistence.load().await.unwrap().is_none());
        // Clearing twice is fine.
        persistence.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_resume_classification() {
        let (persistence, _) = persistence();
        assert_eq!(persistence.resume(0).await.unwrap(), Resume::None);
        persistence.save(&snapshot(0)).await.unwrap();
        assert!(matches!(persistence.resume(HOUR).await.unwrap(), Resume::Fresh(_)));
        let stale = persistence.resume(25 * HOUR).await.unwrap();
        assert!(matches!(stale, Resume::Stale(_)));
        assert!(stale.snapshot().is_some());
        assert!(stale.into_fresh().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let (persistence, store) = persistence();
        store.put(DEFAULT_KEY, b"{not json").await.unwrap();
        let err = persistence.load().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptSnapshot));
    }

    #[tokio::test]
    async fn test_stored_as_camel_case_json() {
        let (persistence, store) = persistence();
        persistence.save(&snapshot(42)).await.unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&store.get(DEFAULT_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(raw["savedAt"], 42);
        assert_eq!(raw["processingMode"], "parallel");
        assert_eq!(raw["folders"][0]["folderName"], "trip");
    }
}
