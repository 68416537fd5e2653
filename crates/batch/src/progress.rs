//! The Progress Store: the single owner of a run's state tree.
//!
//! Everything that changes a run goes through one of the update methods
//! below. Each takes the lock, applies the change, releases it, and then
//! publishes the matching [`ProgressEvent`]s. The lock is never held across an
//! `.await`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use stocktag_model::{BatchRun, BatchStatus, FolderRun, FolderStatus, ImageStatus, Metadata, Stage};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// A change to the run, published after it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Batch { status: BatchStatus, stage: Stage },
    CurrentFolder(usize),
    Folder { folder: usize, status: FolderStatus },
    Image { folder: usize, image: usize, status: ImageStatus },
    Counters { completed: usize, failed: usize, total: usize },
}

pub struct ProgressStore {
    run: Mutex<BatchRun>,
    events: broadcast::Sender<ProgressEvent>,
    /// Embed calls in flight. Only touched while the run lock is held.
    embedding: AtomicUsize,
}
impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(BatchRun::default())
    }
}
impl ProgressStore {
    pub fn new(run: BatchRun) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { run: Mutex::new(run), events, embedding: AtomicUsize::new(0) }
    }

    /// Observe changes. A receiver that falls behind loses the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, BatchRun> {
        // A panic while holding the lock leaves the tree as it was between
        // two field writes, which is still a valid tree.
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: Vec<ProgressEvent>) {
        for event in events {
            // No subscribers is fine.
            _ = self.events.send(event);
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut BatchRun, &mut Vec<ProgressEvent>) -> R) -> R {
        let mut events = Vec::new();
        let result = {
            let mut run = self.lock();
            f(&mut run, &mut events)
        };
        self.publish(events);
        result
    }

    /// Read from the current state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&BatchRun) -> R) -> R {
        f(&self.lock())
    }

    /// A copy of the whole run.
    pub fn current(&self) -> BatchRun {
        self.lock().clone()
    }

    pub fn folder(&self, folder: usize) -> Option<FolderRun> {
        self.read(|run| run.folders.get(folder).cloned())
    }

    /// Swap in a new run, as at the start of a batch.
    pub fn replace(&self, new: BatchRun) {
        self.update(|run, events| {
            *run = new;
            self.embedding.store(0, Ordering::Relaxed);
            events.push(ProgressEvent::Batch { status: run.overall_status, stage: run.current_stage });
            events.push(counters(run));
        });
    }

    pub fn set_processing(&self, processing: bool) {
        self.update(|run, _| run.is_processing = processing);
    }

    pub fn set_status(&self, status: BatchStatus) {
        self.update(|run, events| {
            run.overall_status = status;
            events.push(ProgressEvent::Batch { status, stage: run.current_stage });
        });
    }

    pub fn set_stage(&self, stage: Stage) {
        self.update(|run, events| {
            run.current_stage = stage;
            events.push(ProgressEvent::Batch { status: run.overall_status, stage });
        });
    }

    /// An embed call is starting. The first one in flight moves the run into
    /// [`BatchStatus::Embedding`]; the rest leave it there.
    pub fn begin_embedding(&self) {
        self.update(|run, events| {
            if self.embedding.fetch_add(1, Ordering::Relaxed) == 0 {
                run.overall_status = BatchStatus::Embedding;
                run.current_stage = Stage::MetadataEmbedding;
                events.push(ProgressEvent::Batch { status: run.overall_status, stage: run.current_stage });
            }
        });
    }

    /// An embed call returned. Generation resumes once the last one is done.
    pub fn end_embedding(&self) {
        self.update(|run, events| {
            let in_flight = self.embedding.load(Ordering::Relaxed);
            if in_flight == 0 {
                return;
            }
            self.embedding.store(in_flight - 1, Ordering::Relaxed);
            if in_flight == 1 && run.overall_status == BatchStatus::Embedding {
                run.overall_status = BatchStatus::Processing;
                run.current_stage = Stage::AiGeneration;
                events.push(ProgressEvent::Batch { status: run.overall_status, stage: run.current_stage });
            }
        });
    }

    /// Put the run into [`BatchStatus::Error`] with `message`.
    pub fn fail(&self, message: impl Into<String>) {
        self.update(|run, events| {
            run.overall_status = BatchStatus::Error;
            run.error = Some(message.into());
            run.current_stage = Stage::None;
            run.is_processing = false;
            events.push(ProgressEvent::Batch { status: run.overall_status, stage: run.current_stage });
        });
    }

    /// Move the folder cursor. It never moves backwards.
    pub fn set_current_folder(&self, folder: usize) {
        self.update(|run, events| {
            if folder >= run.current_folder_index {
                run.current_folder_index = folder;
                events.push(ProgressEvent::CurrentFolder(folder));
            }
        });
    }

    pub fn set_folder_status(&self, folder: usize, status: FolderStatus) {
        self.update(|run, events| {
            if let Some(entry) = run.folders.get_mut(folder) {
                entry.status = status;
                events.push(ProgressEvent::Folder { folder, status });
            }
        });
    }

    pub fn set_folder_error(&self, folder: usize, message: impl Into<String>) {
        self.update(|run, events| {
            if let Some(entry) = run.folders.get_mut(folder) {
                entry.status = FolderStatus::Error;
                entry.error = Some(message.into());
                events.push(ProgressEvent::Folder { folder, status: FolderStatus::Error });
            }
        });
    }

    /// Mark a folder completed, provided every image in it is terminal.
    /// Returns `false` (and changes nothing) otherwise.
    pub fn complete_folder(&self, folder: usize) -> bool {
        self.update(|run, events| match run.folders.get_mut(folder) {
            Some(entry) if entry.is_settled() => {
                entry.status = FolderStatus::Completed;
                entry.current_image_index = entry.images.len();
                events.push(ProgressEvent::Folder { folder, status: FolderStatus::Completed });
                true
            },
            _ => false,
        })
    }

    pub fn set_image_cursor(&self, folder: usize, index: usize) {
        self.update(|run, _| {
            if let Some(entry) = run.folders.get_mut(folder) {
                entry.current_image_index = index.min(entry.images.len());
            }
        });
    }

    pub fn set_exported_path(&self, folder: usize, path: PathBuf) {
        self.update(|run, _| {
            if let Some(entry) = run.folders.get_mut(folder) {
                entry.exported_file_path = Some(path);
            }
        });
    }

    pub fn image_status(&self, folder: usize, image: usize) -> Option<ImageStatus> {
        self.read(|run| run.folders.get(folder)?.images.get(image).map(|i| i.status))
    }

    /// Claim an image for processing. Terminal images are never claimed, so
    /// a status can never regress; returns whether the claim succeeded.
    pub fn begin_image(&self, folder: usize, image: usize, file_path: PathBuf) -> bool {
        self.update(|run, events| {
            let Some(entry) = run.folders.get_mut(folder).and_then(|f| f.images.get_mut(image)) else {
                return false;
            };
            if entry.status.is_terminal() {
                return false;
            }
            entry.status = ImageStatus::Processing;
            entry.file_path = Some(file_path);
            events.push(ProgressEvent::Image { folder, image, status: ImageStatus::Processing });
            true
        })
    }

    pub fn complete_image(&self, folder: usize, image: usize, metadata: Metadata) {
        self.settle_image(folder, image, ImageStatus::Completed, Some(metadata), None);
    }

    pub fn fail_image(&self, folder: usize, image: usize, error: impl Into<String>) {
        self.settle_image(folder, image, ImageStatus::Error, None, Some(error.into()));
    }

    fn settle_image(
        &self,
        folder: usize,
        image: usize,
        status: ImageStatus,
        metadata: Option<Metadata>,
        error: Option<String>,
    ) {
        self.update(|run, events| {
            let Some(entry) = run.folders.get_mut(folder).and_then(|f| f.images.get_mut(image)) else {
                return;
            };
            // Terminal exactly once.
            if entry.status.is_terminal() {
                tracing::warn!(folder, image, "Ignoring second terminal transition for image");
                return;
            }
            entry.status = status;
            entry.metadata = metadata;
            entry.error = error;
            match status {
                ImageStatus::Completed => run.completed_images += 1,
                ImageStatus::Error => run.failed_images += 1,
                _ => {},
            }
            events.push(ProgressEvent::Image { folder, image, status });
            events.push(counters(run));
        });
    }
}

fn counters(run: &BatchRun) -> ProgressEvent {
    ProgressEvent::Counters { completed: run.completed_images, failed: run.failed_images, total: run.total_images }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktag_model::{ImageRun, ProcessingMode};

    fn store() -> ProgressStore {
        let folder = FolderRun::new("f", "/photos/trip", vec![ImageRun::new("a.jpg"), ImageRun::new("b.jpg")]);
        ProgressStore::new(BatchRun::new(ProcessingMode::Sequential, 1, vec![folder]))
    }

    #[test]
    fn test_image_lifecycle_updates_counters() {
        let store = store();
        assert!(store.begin_image(0, 0, "/photos/trip/a.jpg".into()));
        store.complete_image(0, 0, Metadata::new("t", "d", ["k"]));
        assert!(store.begin_image(0, 1, "/photos/trip/b.jpg".into()));
        store.fail_image(0, 1, "boom");
        let run = store.current();
        assert_eq!((run.completed_images, run.failed_images, run.total_images), (1, 1, 2));
        assert_eq!(run.folders[0].images[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_embedding_status_holds_while_any_embed_is_in_flight() {
        let store = store();
        store.set_status(BatchStatus::Processing);
        store.set_stage(Stage::AiGeneration);
        store.begin_embedding();
        store.begin_embedding();
        store.end_embedding();
        let run = store.current();
        assert_eq!((run.overall_status, run.current_stage), (BatchStatus::Embedding, Stage::MetadataEmbedding));
        store.end_embedding();
        let run = store.current();
        assert_eq!((run.overall_status, run.current_stage), (BatchStatus::Processing, Stage::AiGeneration));
        // Unbalanced ends are ignored.
        store.end_embedding();
        store.begin_embedding();
        assert_eq!(store.current().overall_status, BatchStatus::Embedding);
    }

    #[test]
    fn test_terminal_images_never_regress() {
        let store = store();
        store.begin_image(0, 0, "a".into());
        store.complete_image(0, 0, Metadata::default());
        assert!(!store.begin_image(0, 0, "a".into()));
        store.fail_image(0, 0, "late failure");
        let run = store.current();
        assert_eq!(run.folders[0].images[0].status, ImageStatus::Completed);
        assert_eq!((run.completed_images, run.failed_images), (1, 0));
    }

    #[test]
    fn test_complete_folder_requires_settled_images() {
        let store = store();
        assert!(!store.complete_folder(0));
        store.fail_image(0, 0, "x");
        store.fail_image(0, 1, "y");
        assert!(store.complete_folder(0));
        let folder = store.folder(0).unwrap();
        assert_eq!(folder.status, FolderStatus::Completed);
        assert_eq!(folder.current_image_index, 2);
    }

    #[test]
    fn test_folder_cursor_is_monotonic() {
        let store = store();
        store.set_current_folder(1);
        store.set_current_folder(0);
        assert_eq!(store.read(|run| run.current_folder_index), 1);
    }

    #[test]
    fn test_events_published_after_mutation() {
        let store = store();
        let mut events = store.subscribe();
        store.set_status(BatchStatus::Processing);
        store.begin_image(0, 0, "a".into());
        store.complete_image(0, 0, Metadata::default());
        assert_eq!(
            events.try_recv().unwrap(),
            ProgressEvent::Batch { status: BatchStatus::Processing, stage: Stage::None }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ProgressEvent::Image { folder: 0, image: 0, status: ImageStatus::Processing }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ProgressEvent::Image { folder: 0, image: 0, status: ImageStatus::Completed }
        );
        assert_eq!(events.try_recv().unwrap(), ProgressEvent::Counters { completed: 1, failed: 0, total: 2 });
    }

    #[test]
    fn test_fail_records_message() {
        let store = store();
        store.set_processing(true);
        store.fail("disk on fire");
        let run = store.current();
        assert_eq!(run.overall_status, BatchStatus::Error);
        assert_eq!(run.error.as_deref(), Some("disk on fire"));
        assert!(!run.is_processing);
    }
}
