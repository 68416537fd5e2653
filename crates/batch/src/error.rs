//! Batch Error Types
//!
//! Per-image failures never surface as errors from the controller: they are
//! recorded on the image and the run carries on. What does surface here is
//! either a collaborator failure (carried verbatim so it can be stored on the
//! image) or something that aborts the whole run.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A batch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for batch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The metadata generator rejected the image. The message is stored on
    /// the image as-is.
    #[display("{_0}")]
    Generation(#[error(not(source))] String),
    #[display("file path not found for {_0}")]
    MissingFilePath(#[error(not(source))] String),
    #[display("invalid prompt template `{_0}`")]
    InvalidTemplate(#[error(not(source))] String),
    #[display("could not render prompt template `{_0}`")]
    Template(#[error(not(source))] String),
    #[display("could not scan folder {}", _0.display())]
    Scan(#[error(not(source))] PathBuf),
    #[display("could not access persisted progress")]
    Persistence,
    #[display("persisted progress snapshot is corrupt")]
    CorruptSnapshot,
    #[display("folder index {_0} is out of range")]
    FolderMissing(#[error(not(source))] usize),
    /// A folder's strategy returned without cancellation, yet some images
    /// are neither completed nor failed.
    #[display("folder {_0} finished with images left unprocessed")]
    Unsettled(#[error(not(source))] String),
    /// A collaborator panicked.
    #[display("unexpected failure: {_0}")]
    Panicked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::Persistence)
    }
}
