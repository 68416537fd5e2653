use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use stocktag_config::{ApiKey, AvoidWords, Limits};
use stocktag_model::Metadata;

/// Everything the metadata generator gets for one image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub file_name: String,
    pub image_path: PathBuf,
    pub provider: String,
    pub model: String,
    pub api_key: ApiKey,
    pub limits: Limits,
    pub include_place_name: bool,
    pub avoid_words: AvoidWords,
    /// The folder's rendered prompt template, if it has one.
    pub template: Option<String>,
    /// Instruction for this image only.
    pub custom_instruction: Option<String>,
}

/// Produces stock metadata for an image, typically by calling an AI provider.
///
/// Failures should be raised as [`ErrorKind::Generation`](crate::error::ErrorKind::Generation)
/// with a message fit to show against the image. Implementations enforce
/// their own timeouts; a call that never returns stalls its image.
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Metadata>;
}
