//! Batch orchestration of AI metadata tagging.
//!
//! A batch is an ordered list of ready folders. Each folder is worked through
//! by a [`Strategy`] (one image at a time, or bounded chunks), every image by
//! the [`TaskRunner`], and the whole by the [`BatchController`], which exports
//! and persists each folder as it finishes.
//!
//! # Lifecycle
//! - **Start**: build the run from ready folders, or from a persisted
//!   [`Snapshot`](stocktag_model::Snapshot) when resuming.
//! - **Cancel**: trip the [`CancellationToken`] passed to that `start`.
//!   Images already in flight finish; nothing new starts, and the run ends
//!   `paused` with its cursors persisted.
//! - **Resume**: start again with the snapshot and a fresh token, on the same
//!   controller or a new one. Terminal images are never processed twice;
//!   images interrupted mid-flight are attempted again.
//!
//! Per-image failures are recorded on the image and never stop the batch.
//! Only invalid prompt templates, collaborator panics and a folder left
//! unsettled put the whole run into `error`.
//!
//! The metadata generator is a seam ([`MetadataGenerator`]): this crate never
//! talks to an AI provider itself.

mod cancel;
mod controller;
pub mod error;
mod generator;
mod persist;
mod progress;
mod runner;
mod source;
mod strategy;
mod template;

pub use crate::cancel::{CancellationToken, cancellable_delay};
pub use crate::controller::BatchController;
pub use crate::generator::{GenerationRequest, MetadataGenerator};
pub use crate::persist::{DEFAULT_KEY, Persistence, Resume};
pub use crate::progress::{ProgressEvent, ProgressStore};
pub use crate::runner::{TaskOutcome, TaskRunner};
pub use crate::source::{MediaFile, PHOTO_EXTENSIONS, ReadyFolder, VIDEO_EXTENSIONS, is_supported, scan, scan_stream};
pub use crate::strategy::{FileLookup, Strategy};
pub use crate::template::{PromptTemplate, TemplateContext, TemplateRegistry};
