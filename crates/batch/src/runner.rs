//! Image Task Runner: one image, start to finish.

use crate::cancel::CancellationToken;
use crate::generator::{GenerationRequest, MetadataGenerator};
use crate::progress::ProgressStore;
use crate::template::{TemplateContext, TemplateRegistry};
use std::path::PathBuf;
use stocktag_config::Config;
use stocktag_embed::{EmbedRequest, TagEmbedder};
use stocktag_model::Metadata;
use tracing::instrument;

/// How far [`TaskRunner::run`] got with an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Cancellation was already requested; the image was left untouched.
    NotStarted,
    /// The image was already terminal.
    Skipped,
    Completed,
    Failed,
}

/// Borrowed view of everything needed to process images. Cheap to build,
/// shared by every image of a folder.
pub struct TaskRunner<'a> {
    pub progress: &'a ProgressStore,
    pub generator: &'a dyn MetadataGenerator,
    pub embedder: Option<&'a dyn TagEmbedder>,
    pub templates: &'a TemplateRegistry,
    pub config: &'a Config,
    pub token: &'a CancellationToken,
}

struct ImageInfo {
    file_name: String,
    folder_name: String,
    template_id: Option<String>,
    custom_instruction: Option<String>,
}

impl TaskRunner<'_> {
    /// Generate (and optionally embed) metadata for one image. Never retries.
    #[instrument(skip(self, file_path), fields(file = %file_path.display()))]
    pub async fn run(&self, folder: usize, image: usize, file_path: PathBuf) -> TaskOutcome {
        if self.token.is_cancelled() {
            return TaskOutcome::NotStarted;
        }
        if !self.progress.begin_image(folder, image, file_path.clone()) {
            return TaskOutcome::Skipped;
        }
        let Some(info) = self.info(folder, image) else {
            return TaskOutcome::Skipped;
        };
        tracing::debug!(image = %info.file_name, "Generating metadata");

        let context = TemplateContext { file_name: &info.file_name, folder_name: &info.folder_name, config: self.config };
        let template = match self.templates.render(info.template_id.as_deref(), &context) {
            Ok(template) => template,
            Err(err) => return self.fail(folder, image, &info.file_name, (*err).to_string()),
        };
        let request = GenerationRequest {
            file_name: info.file_name.clone(),
            image_path: file_path.clone(),
            provider: self.config.provider.clone(),
            model: self.config.model.clone(),
            api_key: self.config.api_key.clone(),
            limits: self.config.limits,
            include_place_name: self.config.include_place_name,
            avoid_words: self.config.avoid_words.clone(),
            template,
            custom_instruction: info.custom_instruction,
        };
        let metadata = match self.generator.generate(request).await {
            Ok(metadata) => metadata,
            Err(err) => return self.fail(folder, image, &info.file_name, (*err).to_string()),
        };

        if self.config.embed_enabled {
            self.embed(&file_path, &metadata).await;
        }
        self.progress.complete_image(folder, image, metadata);
        tracing::debug!(image = %info.file_name, "Image completed");
        TaskOutcome::Completed
    }

    fn info(&self, folder: usize, image: usize) -> Option<ImageInfo> {
        self.progress.read(|run| {
            let folder = run.folders.get(folder)?;
            let image = folder.images.get(image)?;
            Some(ImageInfo {
                file_name: image.file_name.clone(),
                folder_name: folder.folder_name.clone(),
                template_id: folder.assigned_template_id.clone(),
                custom_instruction: image.custom_instruction.clone(),
            })
        })
    }

    fn fail(&self, folder: usize, image: usize, file_name: &str, message: String) -> TaskOutcome {
        tracing::warn!(image = file_name, error = %message, "Metadata generation failed");
        self.progress.fail_image(folder, image, message);
        TaskOutcome::Failed
    }

    /// Embed the enabled fields. Failure is logged, never propagated.
    async fn embed(&self, file_path: &std::path::Path, metadata: &Metadata) {
        let Some(embedder) = self.embedder else {
            tracing::warn!("Embedding is enabled but no tag embedder is available");
            return;
        };
        let fields = self.config.embed_fields;
        if !fields.any() {
            return;
        }
        let request = EmbedRequest {
            title: fields.title.then(|| metadata.title.clone()),
            description: fields.description.then(|| metadata.description.clone()),
            keywords: fields.keywords.then(|| metadata.keywords_joined()),
        };
        self.progress.begin_embedding();
        let result = embedder.embed(file_path, &request).await;
        self.progress.end_embedding();
        match result.success {
            true => tracing::debug!(message = %result.message, "Metadata embedded"),
            false => tracing::warn!(file = %file_path.display(), message = %result.message, "Embedding failed"),
        }
    }
}
