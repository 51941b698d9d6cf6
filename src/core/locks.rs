//! Per-lease serialization of balance-reading writers.
//!
//! Two units of work that read the same lease's `balance_due` and then allocate
//! against it must not interleave. Every service that allocates money holds the
//! lease's lock for the whole unit of work.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::trace;

/// Registry of one async mutex per lease id. Cheap to clone; clones share the registry.
#[derive(Debug, Clone, Default)]
pub struct LeaseLocks {
    locks: Arc<RwLock<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl LeaseLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock of `lease_id`. Released when the guard drops.
    pub async fn lock(&self, lease_id: i64) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&lease_id).map(Arc::clone);
        let mutex = match existing {
            Some(mutex) => mutex,
            None => {
                let mut writer = self.locks.write().await;
                Arc::clone(writer.entry(lease_id).or_default())
            }
        };
        trace!("Waiting for lease lock {}", lease_id);
        mutex.lock_owned().await
    }
}
