//! Folder strategies: which images of a folder run, in what order, and how
//! many at once.

use crate::cancel::cancellable_delay;
use crate::error::{ErrorKind, Result};
use crate::runner::{TaskOutcome, TaskRunner};
use exn::OptionExt;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use stocktag_model::ProcessingMode;
use tracing::instrument;

/// File name to current on-disk path, for one folder.
pub type FileLookup = HashMap<String, PathBuf>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One image at a time, pausing between images.
    Sequential,
    /// Chunks of `workers` images at a time, pausing between chunks. The
    /// chunk size is a hard ceiling on simultaneous generator calls.
    Parallel { workers: usize },
}
impl Strategy {
    pub fn new(mode: ProcessingMode, workers: usize) -> Self {
        match mode {
            ProcessingMode::Sequential => Self::Sequential,
            ProcessingMode::Parallel => Self::Parallel { workers: workers.max(1) },
        }
    }

    /// Work through the folder's images from `start`. Returns once every image
    /// has been tried or cancellation is observed.
    #[instrument(skip(self, runner, lookup), fields(strategy = ?self))]
    pub async fn process(&self, runner: &TaskRunner<'_>, folder: usize, lookup: &FileLookup, start: usize) -> Result<()> {
        let names: Vec<String> = runner
            .progress
            .read(|run| run.folders.get(folder).map(|f| f.images.iter().map(|i| i.file_name.clone()).collect::<Vec<_>>()))
            .ok_or_raise(|| ErrorKind::FolderMissing(folder))?;
        let delay = Duration::from_millis(runner.config.request_delay_ms);
        match *self {
            Self::Sequential => sequential(runner, folder, lookup, &names, start, delay).await,
            Self::Parallel { workers } => parallel(runner, folder, lookup, &names, start, workers, delay).await,
        }
        Ok(())
    }
}

fn is_terminal(runner: &TaskRunner<'_>, folder: usize, image: usize) -> bool {
    runner.progress.image_status(folder, image).is_some_and(|status| status.is_terminal())
}

fn fail_missing(runner: &TaskRunner<'_>, folder: usize, image: usize, file_name: &str) {
    let message = ErrorKind::MissingFilePath(file_name.to_string()).to_string();
    tracing::warn!(image = file_name, "No file path for image");
    runner.progress.fail_image(folder, image, message);
}

async fn sequential(
    runner: &TaskRunner<'_>,
    folder: usize,
    lookup: &FileLookup,
    names: &[String],
    start: usize,
    delay: Duration,
) {
    let last = names.len().saturating_sub(1);
    for (index, file_name) in names.iter().enumerate().skip(start) {
        if runner.token.is_cancelled() {
            break;
        }
        if is_terminal(runner, folder, index) {
            runner.progress.set_image_cursor(folder, index + 1);
            continue;
        }
        let Some(path) = lookup.get(file_name) else {
            fail_missing(runner, folder, index, file_name);
            runner.progress.set_image_cursor(folder, index + 1);
            continue;
        };
        if runner.run(folder, index, path.clone()).await == TaskOutcome::NotStarted {
            break;
        }
        runner.progress.set_image_cursor(folder, index + 1);
        if index < last && !delay.is_zero() && !cancellable_delay(runner.token, delay).await {
            break;
        }
    }
}

async fn parallel(
    runner: &TaskRunner<'_>,
    folder: usize,
    lookup: &FileLookup,
    names: &[String],
    start: usize,
    workers: usize,
    delay: Duration,
) {
    let indices: Vec<usize> = (start.min(names.len())..names.len()).collect();
    let chunks: Vec<&[usize]> = indices.chunks(workers).collect();
    for (n, chunk) in chunks.iter().enumerate() {
        if runner.token.is_cancelled() {
            break;
        }
        let mut tasks = Vec::with_capacity(chunk.len());
        for &index in *chunk {
            if is_terminal(runner, folder, index) {
                continue;
            }
            match lookup.get(&names[index]) {
                Some(path) => tasks.push(runner.run(folder, index, path.clone())),
                None => fail_missing(runner, folder, index, &names[index]),
            }
        }
        let started = tasks.len();
        tracing::debug!(chunk = n, images = started, "Running chunk");
        let outcomes = join_all(tasks).await;

        // The cursor never passes an image that still needs work.
        let boundary = chunk.last().map_or(start, |i| i + 1);
        let cursor = chunk.iter().copied().find(|&i| !is_terminal(runner, folder, i)).unwrap_or(boundary);
        runner.progress.set_image_cursor(folder, cursor);

        if outcomes.contains(&TaskOutcome::NotStarted) || runner.token.is_cancelled() {
            break;
        }
        let more = n + 1 < chunks.len();
        if more && started > 0 && !delay.is_zero() && !cancellable_delay(runner.token, delay).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ProcessingMode::Sequential, 4, Strategy::Sequential)]
    #[case(ProcessingMode::Parallel, 4, Strategy::Parallel { workers: 4 })]
    #[case(ProcessingMode::Parallel, 0, Strategy::Parallel { workers: 1 })]
    fn test_strategy_selection(#[case] mode: ProcessingMode, #[case] workers: usize, #[case] expected: Strategy) {
        assert_eq!(Strategy::new(mode, workers), expected);
    }

    #[test]
    fn test_missing_path_message() {
        assert_eq!(ErrorKind::MissingFilePath("b.jpg".into()).to_string(), "file path not found for b.jpg");
    }
}
