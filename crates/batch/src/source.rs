//! Folder source: which files in a folder are worth tagging.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use stocktag_model::Categories;
use tokio::fs;

pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "tiff", "tga", "avif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "av1", "3gp", "mov", "mkv", "flv", "m4v", "m4p"];

/// Whether the file name carries a supported photo or video extension.
pub fn is_supported(file_name: impl AsRef<Path>) -> bool {
    let Some(ext) = file_name.as_ref().extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return false;
    };
    PHOTO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// One media file in a ready folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub file_path: PathBuf,
    pub categories: Categories,
    pub custom_instruction: Option<String>,
}
impl MediaFile {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            categories: Categories::default(),
            custom_instruction: None,
        }
    }
}

/// A folder whose listing is known, making it eligible for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyFolder {
    pub folder_id: String,
    pub folder_path: PathBuf,
    pub files: Vec<MediaFile>,
    pub template_id: Option<String>,
    pub categories: Categories,
}
impl ReadyFolder {
    pub fn new(folder_id: impl Into<String>, folder_path: impl Into<PathBuf>, files: Vec<MediaFile>) -> Self {
        Self {
            folder_id: folder_id.into(),
            folder_path: folder_path.into(),
            files,
            template_id: None,
            categories: Categories::default(),
        }
    }

    /// Scan `folder_path` and use the path itself as the folder id.
    pub async fn from_scan(folder_path: impl Into<PathBuf>) -> Result<Self> {
        let folder_path = folder_path.into();
        let files = scan(&folder_path).await?;
        let folder_id = folder_path.to_string_lossy().into_owned();
        Ok(Self::new(folder_id, folder_path, files))
    }

    pub fn with_template(mut self, template_id: impl Into<Option<String>>) -> Self {
        self.template_id = template_id.into();
        self
    }

    pub fn with_categories(mut self, categories: Categories) -> Self {
        self.categories = categories;
        self
    }
}

/// Supported media files directly inside `folder`, in directory order.
/// Subdirectories are not descended into.
pub fn scan_stream(folder: &Path) -> impl Stream<Item = Result<MediaFile>> + '_ {
    stream!({
        let scan_error = || ErrorKind::Scan(folder.to_path_buf());
        let mut entries = match fs::read_dir(folder).await.or_raise(scan_error) {
            Ok(entries) => entries,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        loop {
            let entry = match entries.next_entry().await.or_raise(scan_error) {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                    continue;
                },
            };
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if is_file && is_supported(&file_name) {
                yield Ok(MediaFile::new(file_name, entry.path()));
            }
        }
    })
}

/// Supported media files directly inside `folder`, sorted by file name.
pub async fn scan(folder: &Path) -> Result<Vec<MediaFile>> {
    let mut files = Vec::new();
    let mut stream = std::pin::pin!(scan_stream(folder));
    while let Some(file) = stream.next().await {
        files.push(file?);
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    tracing::debug!(folder = %folder.display(), files = files.len(), "Folder scanned");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.jpg", true)]
    #[case("A.JPEG", true)]
    #[case("clip.MoV", true)]
    #[case("render.avif", true)]
    #[case("notes.txt", false)]
    #[case("raw.cr2", false)]
    #[case("jpg", false)]
    #[case(".hidden", false)]
    fn test_is_supported(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_supported(name), expected);
    }

    #[tokio::test]
    async fn test_scan_filters_and_sorts() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "notes.txt", "b.MP4"] {
            std::fs::write(temp_dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("nested.jpg")).unwrap();
        std::fs::write(temp_dir.path().join("nested.jpg").join("d.jpg"), b"").unwrap();
        let files = scan(temp_dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.MP4", "c.png"]);
        assert_eq!(files[0].file_path, temp_dir.path().join("a.jpg"));
    }

    #[tokio::test]
    async fn test_scan_missing_folder() {
        let err = scan(Path::new("/definitely/not/here")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Scan(_)));
    }

    #[tokio::test]
    async fn test_ready_folder_from_scan() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.jpg"), b"").unwrap();
        let folder = ReadyFolder::from_scan(temp_dir.path()).await.unwrap();
        assert_eq!(folder.folder_path, temp_dir.path());
        assert_eq!(folder.folder_id, temp_dir.path().to_string_lossy());
        assert_eq!(folder.files.len(), 1);
    }
}
