//! Embed Error Types
//!
//! Only reading tags reports errors this way. Writing tags reports failure
//! through an unsuccessful [`EmbedResult`](crate::EmbedResult) instead, since
//! a failed embed never fails the image it belongs to.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An embed error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for embed operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("exiftool not detected next to the executable, in resources/, or on PATH")]
    ExifToolNotFound,
    #[display("file does not exist: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    #[display("path is not a file: {}", _0.display())]
    NotAFile(#[error(not(source))] PathBuf),
    /// ExifTool could not be started at all.
    #[display("failed to execute exiftool at {}", _0.display())]
    Spawn(#[error(not(source))] PathBuf),
    #[display("exiftool failed: {_0}")]
    Failed(#[error(not(source))] String),
    #[display("could not parse exiftool output")]
    Parse,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }
}
