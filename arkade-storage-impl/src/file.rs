use crate::snapshot::{decode_snapshot, encode_snapshot, BlockSnapshot};
use crate::storage_traits::{already_exists, check_height, SnapshotStore};
use anyhow::Context;
use arkade_core::error::StorageError;
use log::warn;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const SNAPSHOT_EXTENSION: &str = "snapshot";
const TEMP_EXTENSION: &str = "tmp";

/// Snapshot store writing one file per height into a directory
///
/// Each file holds a length-prefixed bincode snapshot followed by its blake3
/// checksum. Files are written to a temporary name, synced and renamed, so a
/// crash never leaves a partially written snapshot under its final name.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a snapshot directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, height: i64) -> PathBuf {
        self.dir
            .join(format!("{:020}.{}", height, SNAPSHOT_EXTENSION))
    }

    fn parse_height(path: &Path) -> Option<i64> {
        if path.extension()? != SNAPSHOT_EXTENSION {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn put(&self, snapshot: &BlockSnapshot) -> Result<(), StorageError> {
        check_height(snapshot.height)?;
        let path = self.path_for(snapshot.height);
        if path.exists() {
            return Err(already_exists(snapshot.height));
        }

        let bytes = encode_snapshot(snapshot)?;
        let temp_path = path.with_extension(TEMP_EXTENSION);
        {
            let mut file = File::create(&temp_path)
                .with_context(|| format!("Failed to create {:?}", temp_path))?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to move snapshot into place at {:?}", path))?;
        Ok(())
    }

    fn get(&self, height: i64) -> Result<Option<BlockSnapshot>, StorageError> {
        let path = self.path_for(height);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from(e)),
        };

        let snapshot = decode_snapshot(&bytes).map_err(|e| {
            warn!("Snapshot file {:?} failed verification: {}", path, e);
            e
        })?;
        if snapshot.height != height {
            warn!(
                "Snapshot file {:?} holds height {} instead of {}",
                path, snapshot.height, height
            );
            return Err(StorageError::Corrupted(format!(
                "Snapshot file for height {} holds height {}",
                height, snapshot.height
            )));
        }
        Ok(Some(snapshot))
    }

    fn remove(&self, height: i64) -> Result<bool, StorageError> {
        match fs::remove_file(self.path_for(height)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    fn heights(&self) -> Result<Vec<i64>, StorageError> {
        let mut heights = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list snapshot directory {:?}", self.dir))?
        {
            if let Some(height) = Self::parse_height(&entry?.path()) {
                heights.push(height);
            }
        }
        heights.sort_unstable();
        Ok(heights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkade_core::id::{AssetId, OutPoint, Txid};
    use arkade_core::state::AssetState;
    use tempfile::tempdir;

    fn snapshot(height: i64, amount: u64) -> BlockSnapshot {
        let mut state = AssetState::new();
        state.credit(
            OutPoint::new(Txid::new([2; 32]), 0),
            AssetId::new(Txid::new([1; 32]), 0),
            amount,
        )
        .unwrap();
        BlockSnapshot::new(height, state).unwrap()
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshots")).unwrap();

        store.put(&snapshot(0, 10)).unwrap();
        store.put(&snapshot(1, 20)).unwrap();
        store.put(&snapshot(12, 30)).unwrap();

        assert_eq!(store.heights().unwrap(), vec![0, 1, 12]);
        assert_eq!(store.get(1).unwrap().unwrap(), snapshot(1, 20));
        assert_eq!(store.latest().unwrap().unwrap(), snapshot(12, 30));
        assert!(store.get(2).unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileSnapshotStore::new(dir.path()).unwrap();
            store.put(&snapshot(0, 10)).unwrap();
        }

        let store = FileSnapshotStore::new(dir.path()).unwrap();
        assert_eq!(store.latest().unwrap().unwrap(), snapshot(0, 10));
    }

    #[test]
    fn test_file_store_remove_and_immutability() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();

        store.put(&snapshot(0, 10)).unwrap();
        assert!(store.put(&snapshot(0, 11)).is_err());
        assert!(store.remove(0).unwrap());
        assert!(!store.remove(0).unwrap());
        store.put(&snapshot(0, 11)).unwrap();
        assert_eq!(store.get(0).unwrap().unwrap(), snapshot(0, 11));
    }

    #[test]
    fn test_file_store_detects_corruption() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        store.put(&snapshot(3, 10)).unwrap();

        let path = store.path_for(3);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(store.get(3), Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn test_file_store_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("00000000000000000004.tmp"), b"partial").unwrap();

        store.put(&snapshot(1, 10)).unwrap();
        assert_eq!(store.heights().unwrap(), vec![1]);
    }
}
