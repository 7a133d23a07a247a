use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aliver_common::record::DiscoveryRecord;

/// Append-only, thread-safe store of discovery records.
///
/// Clones share the same records. Nothing is ever removed or deduplicated.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    records: Arc<Mutex<Vec<DiscoveryRecord>>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and returns how many records are stored now.
    pub fn append(&self, record: DiscoveryRecord) -> usize {
        let mut records = self.lock();
        records.push(record);
        records.len()
    }

    /// Copy of the records in arrival order.
    pub fn snapshot(&self) -> Vec<DiscoveryRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking appender cannot leave the Vec half-written, so a poisoned
    // lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<DiscoveryRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
