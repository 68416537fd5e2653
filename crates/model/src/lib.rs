//! Progress model for batch tagging runs.
//!
//! A run is a three-level tree: one [`BatchRun`] owns an ordered list of
//! [`FolderRun`]s, each of which owns an ordered list of [`ImageRun`]s. The
//! tree is the single source of truth for both progress reporting and
//! resumption; a [`Snapshot`] is the persisted subset of it.
//!
//! Everything serializes with camelCase field names so that snapshots written
//! by other front ends (and older versions) round-trip unchanged.

pub mod error;
mod metadata;
mod platform;
mod run;
mod snapshot;
mod status;

pub use crate::metadata::{Categories, Metadata};
pub use crate::platform::Platform;
pub use crate::run::{BatchRun, FolderRun, ImageRun};
pub use crate::snapshot::{STALE_AFTER, Snapshot};
pub use crate::status::{BatchStatus, FolderStatus, ImageStatus, ProcessingMode, Stage};
