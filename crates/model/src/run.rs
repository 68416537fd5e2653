use crate::metadata::{Categories, Metadata};
use crate::snapshot::Snapshot;
use crate::status::{BatchStatus, FolderStatus, ImageStatus, ProcessingMode, Stage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Progress of a single media file within a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRun {
    pub file_name: String,
    /// Populated lazily, when the task runner reaches this image. Never
    /// required to be valid after a restore: the path is resolved again from
    /// the current folder listing.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub status: ImageStatus,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub error: Option<String>,
    /// The user's own category selection for this image.
    #[serde(default)]
    pub categories: Categories,
    /// Extra instruction appended to the prompt for this image only.
    #[serde(default)]
    pub custom_instruction: Option<String>,
}
impl ImageRun {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), ..Default::default() }
    }

    pub fn with_categories(mut self, categories: Categories) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_custom_instruction(mut self, instruction: impl Into<Option<String>>) -> Self {
        self.custom_instruction = instruction.into();
        self
    }

    /// `true` once the image completed and carries metadata: the only images
    /// that are ever exported.
    pub fn is_exportable(&self) -> bool {
        self.status == ImageStatus::Completed && self.metadata.is_some()
    }
}

/// Progress of one source folder selected for batch processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRun {
    pub folder_id: String,
    pub folder_path: PathBuf,
    pub folder_name: String,
    #[serde(default)]
    pub status: FolderStatus,
    #[serde(default)]
    pub images: Vec<ImageRun>,
    /// Resume cursor: index of the first image not yet known to be done.
    #[serde(default)]
    pub current_image_index: usize,
    #[serde(default)]
    pub assigned_template_id: Option<String>,
    #[serde(default)]
    pub exported_file_path: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
    /// Folder-level default categories, used where an image has none.
    #[serde(default)]
    pub categories: Categories,
}
impl FolderRun {
    pub fn new(folder_id: impl Into<String>, folder_path: impl Into<PathBuf>, images: Vec<ImageRun>) -> Self {
        let folder_path = folder_path.into();
        Self {
            folder_id: folder_id.into(),
            folder_name: folder_name(&folder_path),
            folder_path,
            images,
            ..Default::default()
        }
    }

    pub fn with_template(mut self, template_id: impl Into<Option<String>>) -> Self {
        self.assigned_template_id = template_id.into();
        self
    }

    pub fn with_categories(mut self, categories: Categories) -> Self {
        self.categories = categories;
        self
    }

    pub fn count(&self, status: ImageStatus) -> usize {
        self.images.iter().filter(|image| image.status == status).count()
    }

    /// Every image is terminal; required before the folder may be marked
    /// [`FolderStatus::Completed`].
    pub fn is_settled(&self) -> bool {
        self.images.iter().all(|image| image.status.is_terminal())
    }

    /// Where work on this folder should pick up: the cursor, or the first
    /// image still needing work if that comes earlier.
    pub fn resume_index(&self) -> usize {
        let first_open = self.images.iter().position(|image| !image.status.is_terminal());
        first_open.unwrap_or(self.images.len()).min(self.current_image_index)
    }
}

/// Derive a display name from the last component of a folder path, falling
/// back to the full path for roots (`/`, `C:\`).
pub(crate) fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Top-level state of one invocation of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    pub is_processing: bool,
    pub overall_status: BatchStatus,
    pub processing_mode: ProcessingMode,
    pub parallel_workers: usize,
    pub current_folder_index: usize,
    pub total_folders: usize,
    pub total_images: usize,
    pub completed_images: usize,
    pub failed_images: usize,
    pub current_stage: Stage,
    pub folders: Vec<FolderRun>,
    /// Message of the failure that put the run into [`BatchStatus::Error`].
    #[serde(default)]
    pub error: Option<String>,
}
impl Default for BatchRun {
    fn default() -> Self {
        Self::new(ProcessingMode::default(), 1, Vec::new())
    }
}
impl BatchRun {
    /// Create an idle run over `folders`. Totals are computed from the folder
    /// contents; `parallel_workers` is clamped to at least one.
    pub fn new(processing_mode: ProcessingMode, parallel_workers: usize, folders: Vec<FolderRun>) -> Self {
        let mut run = Self {
            is_processing: false,
            overall_status: BatchStatus::Idle,
            processing_mode,
            parallel_workers: parallel_workers.max(1),
            current_folder_index: 0,
            total_folders: 0,
            total_images: 0,
            completed_images: 0,
            failed_images: 0,
            current_stage: Stage::None,
            folders,
            error: None,
        };
        run.recount();
        run
    }

    /// Rebuild a run from a persisted snapshot. The worker count is taken
    /// from the *current* configuration, not the snapshot.
    pub fn from_snapshot(snapshot: Snapshot, parallel_workers: usize) -> Self {
        let mut run = Self::new(snapshot.processing_mode, parallel_workers, snapshot.folders);
        run.current_folder_index = snapshot.current_folder_index.min(run.folders.len());
        run
    }

    /// Capture the persistable subset of the run.
    pub fn snapshot(&self, saved_at: i64) -> Snapshot {
        Snapshot {
            folders: self.folders.clone(),
            current_folder_index: self.current_folder_index,
            total_folders: self.total_folders,
            total_images: self.total_images,
            completed_images: self.completed_images,
            failed_images: self.failed_images,
            processing_mode: self.processing_mode,
            saved_at,
        }
    }

    /// Recompute all totals and counters from the folder tree.
    pub fn recount(&mut self) {
        self.total_folders = self.folders.len();
        self.total_images = self.folders.iter().map(|f| f.images.len()).sum();
        self.completed_images = self.folders.iter().map(|f| f.count(ImageStatus::Completed)).sum();
        self.failed_images = self.folders.iter().map(|f| f.count(ImageStatus::Error)).sum();
    }

    /// Images that have reached a terminal status.
    pub fn settled_images(&self) -> usize {
        self.completed_images + self.failed_images
    }
}
