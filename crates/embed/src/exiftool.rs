use crate::error::{ErrorKind, Result};
use crate::{EmbedRequest, EmbedResult, ExifData, TagEmbedder};
use async_trait::async_trait;
use exn::ResultExt;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

#[cfg(windows)]
const EXECUTABLE: &str = "exiftool.exe";
#[cfg(not(windows))]
const EXECUTABLE: &str = "exiftool";

const TITLE_TAGS: &[&str] = &[
    "XMP:Title",
    "Title",
    "IPTC:ObjectName",
    "ObjectName",
    "EXIF:ImageDescription",
    "ImageDescription",
    "PNG:Title",
    "MWG:Title",
];
const DESCRIPTION_TAGS: &[&str] = &[
    "XMP:Description",
    "Description",
    "IPTC:Caption-Abstract",
    "Caption-Abstract",
    "CaptionAbstract",
    "EXIF:ImageDescription",
    "ImageDescription",
    "PNG:Description",
    "MWG:Description",
];
const KEYWORD_TAGS: &[&str] = &["XMP:Subject", "Subject", "IPTC:Keywords", "Keywords", "XMP-dc:Subject", "dc:Subject"];

/// An ExifTool executable.
#[derive(Debug, Clone)]
pub struct ExifTool {
    path: PathBuf,
}
impl ExifTool {
    /// Use the executable at `path` without checking it exists.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Look for a bundled copy beside the current executable first, then
    /// fall back to `PATH`.
    pub fn discover() -> Result<Self> {
        let exe_dir = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf));
        if let Some(found) = exe_dir.as_deref().and_then(Self::bundled_in) {
            return Ok(found);
        }
        tracing::debug!("No bundled exiftool found; searching PATH");
        match which::which(EXECUTABLE) {
            Ok(path) => Ok(Self { path }),
            Err(_) => exn::bail!(ErrorKind::ExifToolNotFound),
        }
    }

    fn bundled_in(dir: &Path) -> Option<Self> {
        [dir.join(EXECUTABLE), dir.join("resources").join(EXECUTABLE)]
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map(|path| Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments for writing `request` into `file_path`. The file path is
    /// always last.
    pub fn build_args(file_path: &Path, request: &EmbedRequest) -> Vec<OsString> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|v| !v.trim().is_empty())
        }
        let mut args: Vec<OsString> = Vec::new();
        if let Some(title) = present(&request.title) {
            args.push(format!("-XMP:Title={title}").into());
            args.push(format!("-IPTC:ObjectName={title}").into());
            args.push(format!("-EXIF:ImageDescription={title}").into());
        }
        if let Some(description) = present(&request.description) {
            args.push(format!("-XMP:Description={description}").into());
            args.push(format!("-EXIF:ImageDescription={description}").into());
            args.push(format!("-IPTC:Caption-Abstract={description}").into());
        }
        let keywords = request.keyword_list();
        if let (Some(joined), false) = (present(&request.keywords), keywords.is_empty()) {
            for keyword in keywords {
                args.push(format!("-XMP:Subject={keyword}").into());
            }
            args.push(format!("-IPTC:Keywords={joined}").into());
        }
        args.push("-overwrite_original".into());
        args.push(file_path.as_os_str().to_os_string());
        args
    }

    fn validate_file(file_path: &Path) -> Result<()> {
        if !file_path.exists() {
            exn::bail!(ErrorKind::FileNotFound(file_path.to_path_buf()));
        }
        if !file_path.is_file() {
            exn::bail!(ErrorKind::NotAFile(file_path.to_path_buf()));
        }
        Ok(())
    }

    /// Read the title, description and keywords already stored in a file.
    #[instrument(skip(self), fields(exiftool = %self.path.display()))]
    pub async fn read(&self, file_path: &Path) -> Result<ExifData> {
        Self::validate_file(file_path)?;
        let output = Command::new(&self.path)
            .arg("-json")
            .arg("-n")
            .arg(file_path)
            .output()
            .await
            .or_raise(|| ErrorKind::Spawn(self.path.clone()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            exn::bail!(ErrorKind::Failed(stderr));
        }
        tracing::trace!(bytes = output.stdout.len(), "ExifTool JSON output received");
        Self::parse_read_output(file_path, &output.stdout)
    }

    fn parse_read_output(file_path: &Path, stdout: &[u8]) -> Result<ExifData> {
        let json: Value = serde_json::from_slice(stdout).or_raise(|| ErrorKind::Parse)?;
        let Some(tags) = json.as_array().and_then(|items| items.first()).and_then(Value::as_object) else {
            return Ok(ExifData { file_path: file_path.to_path_buf(), ..ExifData::default() });
        };
        let first_string = |names: &[&str]| -> Option<String> {
            names.iter().find_map(|name| tags.get(*name)).and_then(Value::as_str).map(str::to_string)
        };
        Ok(ExifData {
            file_path: file_path.to_path_buf(),
            title: first_string(TITLE_TAGS),
            description: first_string(DESCRIPTION_TAGS),
            keywords: Self::keywords_from(tags),
        })
    }

    fn keywords_from(tags: &Map<String, Value>) -> Option<String> {
        match KEYWORD_TAGS.iter().find_map(|name| tags.get(*name))? {
            Value::Array(items) => {
                let list: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                (!list.is_empty()).then(|| list.join(", "))
            },
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl TagEmbedder for ExifTool {
    #[instrument(skip(self, request), fields(exiftool = %self.path.display()))]
    async fn embed(&self, file_path: &Path, request: &EmbedRequest) -> EmbedResult {
        if let Err(err) = Self::validate_file(file_path) {
            return EmbedResult::failure(file_path, (*err).to_string());
        }
        if !request.has_metadata() {
            return EmbedResult::success(file_path, "No metadata provided to embed");
        }
        let output = match Command::new(&self.path).args(Self::build_args(file_path, request)).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return EmbedResult::failure(
                    file_path,
                    format!("ExifTool not found (tried {}); install it or bundle it with the application", self.path.display()),
                );
            },
            Err(e) => return EmbedResult::failure(file_path, format!("Failed to execute exiftool: {e}")),
        };
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.success() {
            tracing::debug!("Metadata embedded");
            let message = match stderr.is_empty() {
                true => "Metadata successfully embedded".to_string(),
                false => format!("Metadata successfully embedded. Warning: {stderr}"),
            };
            EmbedResult::success(file_path, message)
        } else {
            let code = output.status.code().unwrap_or(-1);
            EmbedResult::failure(file_path, format!("Failed to embed metadata. Exit code: {code}. Stderr: {stderr}"))
        }
    }
}
