use crate::error::{Error, ErrorKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Overall status of a batch run.
///
/// ```text
/// idle -> scanning -> processing -> (embedding) -> exporting -> completed
///                         |                           |
///                         +------> paused / error <---+
/// ```
///
/// `paused` resumes back into `processing` at the stored cursor. `completed`
/// and `error` are terminal for the run that produced them.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    #[display("idle")]
    Idle,
    #[display("scanning")]
    Scanning,
    #[display("processing")]
    Processing,
    #[display("embedding")]
    Embedding,
    #[display("exporting")]
    Exporting,
    #[display("completed")]
    Completed,
    #[display("paused")]
    Paused,
    #[display("error")]
    Error,
}
impl BatchStatus {
    /// Whether the run that produced this status has finished (successfully or
    /// not). A paused run is not finished: it can be resumed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// The stage of work currently being performed within a folder.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[display("ai_generation")]
    AiGeneration,
    #[display("metadata_embedding")]
    MetadataEmbedding,
    #[display("exporting")]
    Exporting,
    #[default]
    #[display("none")]
    None,
}

/// How images within a single folder are fed to the task runner. Folders are
/// always processed one at a time regardless of mode.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    #[default]
    #[display("sequential")]
    Sequential,
    #[display("parallel")]
    Parallel,
}
impl FromStr for ProcessingMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "seq" => Ok(Self::Sequential),
            "parallel" | "par" => Ok(Self::Parallel),
            _ => exn::bail!(ErrorKind::Unrecognized(s.to_string())),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    #[default]
    #[display("pending")]
    Pending,
    #[display("processing")]
    Processing,
    #[display("completed")]
    Completed,
    #[display("error")]
    Error,
}

/// Lifecycle of a single image: `pending -> processing -> completed | error`.
///
/// Within a run an image becomes terminal exactly once and never regresses
/// to `pending`.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    #[default]
    #[display("pending")]
    Pending,
    #[display("processing")]
    Processing,
    #[display("completed")]
    Completed,
    #[display("error")]
    Error,
}
impl ImageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sequential", ProcessingMode::Sequential)]
    #[case("Parallel", ProcessingMode::Parallel)]
    #[case(" par ", ProcessingMode::Parallel)]
    #[case("seq", ProcessingMode::Sequential)]
    fn test_parse_processing_mode(#[case] input: &str, #[case] expected: ProcessingMode) {
        assert_eq!(input.parse::<ProcessingMode>().unwrap(), expected);
    }

    #[test]
    fn test_parse_processing_mode_invalid() {
        let err = "turbo".parse::<ProcessingMode>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unrecognized(s) if s == "turbo"));
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&Stage::AiGeneration).unwrap(), "\"ai_generation\"");
        assert_eq!(serde_json::to_string(&Stage::MetadataEmbedding).unwrap(), "\"metadata_embedding\"");
        assert_eq!(serde_json::to_string(&BatchStatus::Paused).unwrap(), "\"paused\"");
        assert_eq!(serde_json::to_string(&ImageStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ImageStatus::Completed.is_terminal());
        assert!(ImageStatus::Error.is_terminal());
        assert!(!ImageStatus::Processing.is_terminal());
        assert!(!ImageStatus::Pending.is_terminal());
        assert!(BatchStatus::Error.is_terminal());
        assert!(!BatchStatus::Paused.is_terminal());
    }
}
