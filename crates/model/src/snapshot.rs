use crate::run::FolderRun;
use crate::status::{FolderStatus, ImageStatus, ProcessingMode};
use serde::{Deserialize, Serialize};
use time::{Duration, UtcDateTime};

/// Snapshots older than this are only offered informationally; they are
/// never resumed automatically.
pub const STALE_AFTER: Duration = Duration::hours(24);

/// The persisted subset of a [`BatchRun`](crate::BatchRun).
///
/// This is the only coupling between the orchestrator and whatever durable
/// store holds it, so the field names are part of the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub folders: Vec<FolderRun>,
    pub current_folder_index: usize,
    pub total_folders: usize,
    pub total_images: usize,
    pub completed_images: usize,
    pub failed_images: usize,
    pub processing_mode: ProcessingMode,
    /// Unix epoch, in milliseconds.
    pub saved_at: i64,
}
impl Snapshot {
    /// Current time as Unix epoch milliseconds.
    pub fn now_millis() -> i64 {
        let nanos = UtcDateTime::now().unix_timestamp_nanos();
        i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
    }

    /// How long ago the snapshot was saved, relative to `now` (epoch millis).
    /// Clock skew that puts the snapshot in the future yields a zero age.
    pub fn age(&self, now: i64) -> Duration {
        Duration::milliseconds(now.saturating_sub(self.saved_at).max(0))
    }

    pub fn is_stale(&self, now: i64) -> bool {
        self.age(now) > STALE_AFTER
    }

    /// Prepare a snapshot for a caller-initiated retry of failed images.
    ///
    /// Every `error` image goes back to `pending` with its error and metadata
    /// cleared, folders containing such images go back to `pending` with their
    /// cursor on the first of them (never later than it already was), and the
    /// batch cursor rewinds to the first affected folder. Returns the number of
    /// images reset.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        let mut first_folder = None;
        for (folder_index, folder) in self.folders.iter_mut().enumerate() {
            let mut first_image = None;
            for (image_index, image) in folder.images.iter_mut().enumerate() {
                if image.status != ImageStatus::Error {
                    continue;
                }
                image.status = ImageStatus::Pending;
                image.error = None;
                image.metadata = None;
                first_image.get_or_insert(image_index);
                reset += 1;
            }
            if let Some(image_index) = first_image {
                folder.status = FolderStatus::Pending;
                folder.error = None;
                folder.current_image_index = folder.current_image_index.min(image_index);
                first_folder.get_or_insert(folder_index);
            }
        }
        if let Some(folder_index) = first_folder {
            self.current_folder_index = folder_index;
        }
        self.failed_images = self.failed_images.saturating_sub(reset);
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{BatchRun, ImageRun};

    fn snapshot_with(statuses: &[&[ImageStatus]]) -> Snapshot {
        let folders = statuses
            .iter()
            .enumerate()
            .map(|(f, images)| {
                let images = images
                    .iter()
                    .enumerate()
                    .map(|(i, status)| ImageRun { status: *status, ..ImageRun::new(format!("{i}.jpg")) })
                    .collect();
                let mut folder = FolderRun::new(format!("f{f}"), format!("/photos/{f}"), images);
                folder.status = FolderStatus::Completed;
                folder.current_image_index = folder.images.len();
                folder
            })
            .collect();
        let mut run = BatchRun::new(ProcessingMode::Sequential, 1, folders);
        run.current_folder_index = run.folders.len();
        run.snapshot(0)
    }

    #[test]
    fn test_staleness() {
        let snapshot = Snapshot { saved_at: 1_000, ..snapshot_with(&[]) };
        let hour = 60 * 60 * 1000;
        assert!(!snapshot.is_stale(1_000 + 23 * hour));
        assert!(!snapshot.is_stale(1_000 + 24 * hour));
        assert!(snapshot.is_stale(1_000 + 24 * hour + 1));
        // Saved "in the future" is not stale.
        assert_eq!(snapshot.age(0), Duration::ZERO);
    }

    #[test]
    fn test_json_shape() {
        let snapshot = snapshot_with(&[&[ImageStatus::Completed]]);
        let json = serde_json::to_value(&snapshot).unwrap();
        for key in [
            "folders",
            "currentFolderIndex",
            "totalFolders",
            "totalImages",
            "completedImages",
            "failedImages",
            "processingMode",
            "savedAt",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["folders"][0]["images"][0]["status"], "completed");
        assert_eq!(json["folders"][0]["currentImageIndex"], 1);
    }

    #[test]
    fn test_reset_failed() {
        use ImageStatus::*;
        let mut snapshot = snapshot_with(&[&[Completed, Completed], &[Completed, Error, Error]]);
        assert_eq!(snapshot.failed_images, 2);
        assert_eq!(snapshot.reset_failed(), 2);
        assert_eq!(snapshot.failed_images, 0);
        assert_eq!(snapshot.current_folder_index, 1);
        assert_eq!(snapshot.folders[0].status, FolderStatus::Completed);
        let folder = &snapshot.folders[1];
        assert_eq!(folder.status, FolderStatus::Pending);
        assert_eq!(folder.current_image_index, 1);
        assert_eq!(folder.images[1].status, Pending);
        assert!(folder.images[2].error.is_none());
        assert_eq!(folder.images[0].status, Completed);
    }

    #[test]
    fn test_reset_failed_keeps_earlier_cursor() {
        use ImageStatus::*;
        // Paused with image 0 still in flight and image 1 already failed.
        let mut snapshot = snapshot_with(&[&[Processing, Error]]);
        snapshot.folders[0].status = FolderStatus::Processing;
        snapshot.folders[0].current_image_index = 0;
        snapshot.current_folder_index = 0;
        assert_eq!(snapshot.reset_failed(), 1);
        assert_eq!(snapshot.folders[0].current_image_index, 0);
        assert_eq!(snapshot.folders[0].images[0].status, Processing);
    }

    #[test]
    fn test_reset_failed_nothing_to_do() {
        let mut snapshot = snapshot_with(&[&[ImageStatus::Completed]]);
        assert_eq!(snapshot.reset_failed(), 0);
        assert_eq!(snapshot.current_folder_index, 1);
    }
}
