//! Batch Controller: drives ready folders through a strategy, one folder at a
//! time, exporting and persisting as each one finishes.

use crate::cancel::CancellationToken;
use crate::error::{ErrorKind, Result};
use crate::generator::MetadataGenerator;
use crate::persist::Persistence;
use crate::progress::ProgressStore;
use crate::runner::TaskRunner;
use crate::source::{ReadyFolder, is_supported};
use crate::strategy::{FileLookup, Strategy};
use crate::template::TemplateRegistry;
use exn::OptionExt;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use stocktag_config::Config;
use stocktag_embed::TagEmbedder;
use stocktag_model::{BatchRun, BatchStatus, FolderRun, FolderStatus, ImageRun, Snapshot, Stage};
use tracing::instrument;

enum Flow {
    Finished,
    Paused,
}

pub struct BatchController {
    generator: Arc<dyn MetadataGenerator>,
    embedder: Option<Arc<dyn TagEmbedder>>,
    persistence: Option<Persistence>,
    progress: Arc<ProgressStore>,
}
impl BatchController {
    pub fn new(generator: Arc<dyn MetadataGenerator>) -> Self {
        Self {
            generator,
            embedder: None,
            persistence: None,
            progress: Arc::new(ProgressStore::default()),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TagEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// The live state of the current (or last) run. Subscribe before calling
    /// [`start`](Self::start) to see every event.
    pub fn progress(&self) -> Arc<ProgressStore> {
        self.progress.clone()
    }

    /// Run the batch to a terminal or paused state.
    ///
    /// With `resume`, the snapshot's folders and cursors are used instead of
    /// `ready`; `ready` still supplies the current on-disk file paths. The
    /// current configuration's mode and worker count always apply.
    ///
    /// Cancelling `token` pauses this run only: in-flight generator calls
    /// finish and nothing new starts. Resume with a fresh token.
    #[instrument(skip_all, fields(mode = %config.processing_mode, workers = config.parallel_workers))]
    pub async fn start(
        &self,
        ready: Vec<ReadyFolder>,
        config: &Config,
        resume: Option<Snapshot>,
        token: &CancellationToken,
    ) -> BatchRun {
        let resumed = resume.is_some();
        self.progress.replace(build_run(&ready, config, resume));
        self.progress.set_processing(true);
        self.progress.set_status(BatchStatus::Processing);
        let (folders, images, done) = self.progress.read(|r| (r.total_folders, r.total_images, r.settled_images()));
        tracing::info!(folders, images, already_done = done, resumed, "Batch started");

        let templates = match TemplateRegistry::compile(&config.templates) {
            Ok(templates) => templates,
            Err(err) => {
                self.abort((*err).to_string()).await;
                return self.progress.current();
            },
        };
        let lookups: HashMap<String, FileLookup> = ready
            .iter()
            .map(|folder| {
                let lookup: FileLookup =
                    folder.files.iter().map(|f| (f.file_name.clone(), f.file_path.clone())).collect();
                (folder.folder_id.clone(), lookup)
            })
            .collect();

        match AssertUnwindSafe(self.run_folders(config, &templates, &lookups, token)).catch_unwind().await {
            Ok(Ok(Flow::Finished)) => self.finish().await,
            Ok(Ok(Flow::Paused)) => self.pause().await,
            Ok(Err(err)) => self.abort((*err).to_string()).await,
            Err(panic) => self.abort(ErrorKind::Panicked(panic_message(panic)).to_string()).await,
        }
        self.progress.current()
    }

    async fn run_folders(
        &self,
        config: &Config,
        templates: &TemplateRegistry,
        lookups: &HashMap<String, FileLookup>,
        token: &CancellationToken,
    ) -> Result<Flow> {
        let runner = TaskRunner {
            progress: &self.progress,
            generator: self.generator.as_ref(),
            embedder: self.embedder.as_deref(),
            templates,
            config,
            token,
        };
        let strategy = Strategy::new(config.processing_mode, config.parallel_workers);
        let empty = FileLookup::new();
        let (start, total) = self.progress.read(|r| (r.current_folder_index, r.folders.len()));

        for index in start..total {
            if token.is_cancelled() {
                return Ok(Flow::Paused);
            }
            self.progress.set_current_folder(index);
            let folder = self.progress.folder(index).ok_or_raise(|| ErrorKind::FolderMissing(index))?;
            if folder.status == FolderStatus::Completed {
                continue;
            }
            tracing::info!(folder = %folder.folder_name, images = folder.images.len(), "Processing folder");
            self.progress.set_folder_status(index, FolderStatus::Processing);
            self.progress.set_status(BatchStatus::Processing);
            self.progress.set_stage(Stage::AiGeneration);

            let lookup = lookups.get(&folder.folder_id).unwrap_or(&empty);
            strategy.process(&runner, index, lookup, folder.resume_index()).await?;
            if token.is_cancelled() {
                return Ok(Flow::Paused);
            }
            if !self.progress.complete_folder(index) {
                exn::bail!(ErrorKind::Unsettled(folder.folder_name));
            }

            if let Some(root) = &config.export.root {
                self.export_folder(index, config, root).await;
            }
            self.progress.set_current_folder(index + 1);
            self.save().await;
            tracing::info!(folder = %folder.folder_name, "Folder completed");
        }
        Ok(Flow::Finished)
    }

    /// Write one export per configured platform. Failures leave the folder's
    /// export path unset but do not stop the run.
    async fn export_folder(&self, index: usize, config: &Config, root: &Path) {
        self.progress.set_status(BatchStatus::Exporting);
        self.progress.set_stage(Stage::Exporting);
        if let Some(folder) = self.progress.folder(index) {
            for platform in &config.export.platforms {
                match stocktag_export::export(&folder, &config.export.categories, *platform, root).await {
                    Ok(Some(path)) => self.progress.set_exported_path(index, path),
                    Ok(None) => {},
                    Err(err) => tracing::warn!(folder = %folder.folder_name, %platform, error = ?err, "Export failed"),
                }
            }
        }
        self.progress.set_status(BatchStatus::Processing);
    }

    async fn save(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = self.progress.read(|run| run.snapshot(Snapshot::now_millis()));
        if let Err(err) = persistence.save(&snapshot).await {
            tracing::warn!(error = ?err, "Could not persist progress");
        }
    }

    async fn finish(&self) {
        self.progress.set_stage(Stage::None);
        self.progress.set_status(BatchStatus::Completed);
        self.progress.set_processing(false);
        if let Some(persistence) = &self.persistence
            && let Err(err) = persistence.clear().await
        {
            tracing::warn!(error = ?err, "Could not clear persisted progress");
        }
        let (completed, failed) = self.progress.read(|r| (r.completed_images, r.failed_images));
        tracing::info!(completed, failed, "Batch completed");
    }

    async fn pause(&self) {
        self.progress.set_stage(Stage::None);
        self.progress.set_status(BatchStatus::Paused);
        self.progress.set_processing(false);
        self.save().await;
        let (folder, image) = self.progress.read(|r| {
            let image = r.folders.get(r.current_folder_index).map_or(0, |f| f.current_image_index);
            (r.current_folder_index, image)
        });
        tracing::info!(folder, image, "Batch paused");
    }

    async fn abort(&self, message: String) {
        tracing::error!(error = %message, "Batch failed");
        let current = self.progress.read(|r| r.current_folder_index);
        if self.progress.folder(current).is_some_and(|f| f.status == FolderStatus::Processing) {
            self.progress.set_folder_error(current, message.clone());
        }
        self.progress.fail(message);
        self.save().await;
    }
}

fn build_run(ready: &[ReadyFolder], config: &Config, resume: Option<Snapshot>) -> BatchRun {
    match resume {
        Some(snapshot) => {
            let mut run = BatchRun::from_snapshot(snapshot, config.parallel_workers);
            run.processing_mode = config.processing_mode;
            run
        },
        None => {
            let folders = ready.iter().map(folder_run).collect();
            BatchRun::new(config.processing_mode, config.parallel_workers, folders)
        },
    }
}

fn folder_run(ready: &ReadyFolder) -> FolderRun {
    let images = ready
        .files
        .iter()
        .filter(|file| is_supported(&file.file_name))
        .map(|file| {
            ImageRun::new(file.file_name.clone())
                .with_categories(file.categories.clone())
                .with_custom_instruction(file.custom_instruction.clone())
        })
        .collect();
    FolderRun::new(ready.folder_id.clone(), ready.folder_path.clone(), images)
        .with_template(ready.template_id.clone())
        .with_categories(ready.categories.clone())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
