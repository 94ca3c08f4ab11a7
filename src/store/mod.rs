//! Flat-file persistence for the price cache and the record directories.

pub mod disk;
pub mod memory;

use anyhow::Result;

/// A single persisted record, such as the price cache file.
pub trait RecordStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>>;

    fn write(&self, contents: &str) -> Result<()>;
}
