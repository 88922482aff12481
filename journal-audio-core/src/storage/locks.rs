use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Table of per-name mutexes.
///
/// Serializes work on the same logical name (a storage key, a target file)
/// without any cross-name locking. Idle entries are pruned on access.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mutex for `name`; lock it for the duration of the guarded operation.
    pub(crate) fn handle(&self, name: &str) -> Arc<Mutex<()>> {
        let mut table = self.table.lock();
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(table.entry(name.to_string()).or_default())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().len()
    }
}
