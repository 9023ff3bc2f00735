use crate::snapshot::BlockSnapshot;
use arkade_core::error::StorageError;

/// Append-only log of committed block snapshots keyed by height
///
/// Snapshots are immutable once written. The only way to replace one is to
/// remove it (rollback) and put a new snapshot for the same height.
pub trait SnapshotStore {
    /// Persist a snapshot
    ///
    /// # Parameters
    /// * `snapshot` - The snapshot to store; its height must be non-negative
    ///   and not already present
    ///
    /// # Returns
    /// Ok(()) once the snapshot is durable
    fn put(&self, snapshot: &BlockSnapshot) -> Result<(), StorageError>;

    /// Get the snapshot for a height
    ///
    /// # Parameters
    /// * `height` - The block height
    ///
    /// # Returns
    /// Some(snapshot) if one was stored for that height, None otherwise
    fn get(&self, height: i64) -> Result<Option<BlockSnapshot>, StorageError>;

    /// Remove the snapshot for a height
    ///
    /// # Returns
    /// True if a snapshot was removed
    fn remove(&self, height: i64) -> Result<bool, StorageError>;

    /// All stored heights in ascending order
    fn heights(&self) -> Result<Vec<i64>, StorageError>;

    /// The snapshot with the greatest height, if any
    fn latest(&self) -> Result<Option<BlockSnapshot>, StorageError> {
        match self.heights()?.last() {
            Some(height) => self.get(*height),
            None => Ok(None),
        }
    }
}

/// Reject heights a store can never hold
pub(crate) fn check_height(height: i64) -> Result<(), StorageError> {
    if height < 0 {
        return Err(StorageError::Other(format!(
            "Cannot store snapshot for negative height {}",
            height
        )));
    }
    Ok(())
}

pub(crate) fn already_exists(height: i64) -> StorageError {
    StorageError::Other(format!("Snapshot for height {} already exists", height))
}
