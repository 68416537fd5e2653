//! SQLite key-value store for persisted progress.
//!
//! A drop-in [`KeyValueStore`](stocktag_storage::KeyValueStore) for setups
//! that would rather keep progress in a single database file than in loose
//! files on disk. Values stay opaque; the only schema is a key, a blob and the
//! time it was last written.

mod db;
pub mod error;
mod store;

pub use crate::db::Database;
pub use crate::store::SqliteStore;
