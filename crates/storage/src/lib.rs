//! Durable key-value storage.
//!
//! The orchestrator only ever needs to save, load and clear a handful of
//! opaque blobs (serialized progress snapshots), so storage is modelled as a
//! flat key-value store rather than tied to any particular technology.
//! Backends in this crate cover the local filesystem and (behind the `mock`
//! feature) memory; the `stocktag-cache` crate provides SQLite.

pub mod backend;
pub mod error;
mod key;

pub use crate::backend::KeyValueStore;
pub use crate::key::validate as validate_key;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn KeyValueStore + Send + Sync>;
