use crate::snapshot::BlockSnapshot;
use crate::storage_traits::{already_exists, check_height, SnapshotStore};
use arkade_core::error::StorageError;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Snapshot store kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<BTreeMap<i64, BlockSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Other(format!("Failed to acquire lock: {}", e))
}

impl SnapshotStore for InMemorySnapshotStore {
    fn put(&self, snapshot: &BlockSnapshot) -> Result<(), StorageError> {
        check_height(snapshot.height)?;
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        if snapshots.contains_key(&snapshot.height) {
            return Err(already_exists(snapshot.height));
        }
        snapshots.insert(snapshot.height, snapshot.clone());
        Ok(())
    }

    fn get(&self, height: i64) -> Result<Option<BlockSnapshot>, StorageError> {
        let snapshots = self.snapshots.read().map_err(poisoned)?;
        Ok(snapshots.get(&height).cloned())
    }

    fn remove(&self, height: i64) -> Result<bool, StorageError> {
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        Ok(snapshots.remove(&height).is_some())
    }

    fn heights(&self) -> Result<Vec<i64>, StorageError> {
        let snapshots = self.snapshots.read().map_err(poisoned)?;
        Ok(snapshots.keys().copied().collect())
    }

    fn latest(&self) -> Result<Option<BlockSnapshot>, StorageError> {
        let snapshots = self.snapshots.read().map_err(poisoned)?;
        Ok(snapshots.values().next_back().cloned())
    }
}
