use crate::store::RecordStore;
use anyhow::{Result, anyhow};
use std::sync::Mutex;
use tracing::debug;

/// In-memory record store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record, if any.
    pub fn contents(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|record| record.clone())
    }
}

impl RecordStore for MemoryStore {
    fn read(&self) -> Result<Option<String>> {
        let record = self
            .inner
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        debug!(present = record.is_some(), "Memory store READ");
        Ok(record.clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        let mut record = self
            .inner
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        debug!("Memory store WRITE");
        *record = Some(contents.to_string());
        Ok(())
    }
}
