mod exiftool;
pub mod error;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::exiftool::ExifTool;

/// The fields to write into a media file. `None` (or blank) fields are left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Comma-separated keywords.
    pub keywords: Option<String>,
}
impl EmbedRequest {
    /// Whether there is anything to write at all.
    pub fn has_metadata(&self) -> bool {
        [&self.title, &self.description, &self.keywords]
            .into_iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    /// Individual keywords, trimmed, blanks dropped.
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .as_deref()
            .map(|k| k.split(',').map(str::trim).filter(|k| !k.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Outcome of an embed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedResult {
    pub success: bool,
    pub message: String,
    pub file_path: PathBuf,
}
impl EmbedResult {
    pub fn success(file_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), file_path: file_path.into() }
    }

    pub fn failure(file_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), file_path: file_path.into() }
    }
}

/// Tags already present in a media file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifData {
    pub file_path: PathBuf,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
}

/// Writes metadata tags into media files.
///
/// Implementations never fail outright: anything that goes wrong is reported
/// as an unsuccessful [`EmbedResult`].
#[async_trait]
pub trait TagEmbedder: Send + Sync {
    async fn embed(&self, file_path: &Path, request: &EmbedRequest) -> EmbedResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EmbedRequest::default(), false)]
    #[case(EmbedRequest { title: Some("  ".into()), ..Default::default() }, false)]
    #[case(EmbedRequest { title: Some("Sunset".into()), ..Default::default() }, true)]
    #[case(EmbedRequest { keywords: Some("a, b".into()), ..Default::default() }, true)]
    fn test_has_metadata(#[case] request: EmbedRequest, #[case] expected: bool) {
        assert_eq!(request.has_metadata(), expected);
    }

    #[test]
    fn test_keyword_list() {
        let request = EmbedRequest { keywords: Some("sunset, beach,, ocean ,".into()), ..Default::default() };
        assert_eq!(request.keyword_list(), vec!["sunset", "beach", "ocean"]);
    }
}
