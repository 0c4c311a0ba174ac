//! Passage Storage Layer
//!
//! Snapshot persistence for the client session. A snapshot is one serialized
//! document stored under a fixed key; the session crate decides what goes in it.

mod database;
mod error;
mod memory;
mod migrations;

pub use database::Database;
pub use error::StorageError;
pub use memory::MemoryStorage;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key/value persistence for serialized snapshots.
///
/// Implementations must treat `store` as a full replacement of the previous
/// value under the same key.
pub trait SnapshotStorage: Send + Sync {
    /// Load the value stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn store(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
