//! Export Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An export error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not create export directory {}", _0.display())]
    CreateDir(#[error(not(source))] PathBuf),
    #[display("could not write export file {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    #[display("could not format export date")]
    Date,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}
