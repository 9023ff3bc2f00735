#[cfg(feature = "rocksdb")]
use crate::snapshot::{decode_snapshot, encode_snapshot, BlockSnapshot};
#[cfg(feature = "rocksdb")]
use crate::storage_traits::{already_exists, check_height, SnapshotStore};
#[cfg(feature = "rocksdb")]
use anyhow::Context;
#[cfg(feature = "rocksdb")]
use arkade_core::error::StorageError;
#[cfg(feature = "rocksdb")]
use log::warn;
#[cfg(feature = "rocksdb")]
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
#[cfg(feature = "rocksdb")]
use std::path::{Path, PathBuf};

#[cfg(feature = "rocksdb")]
// Column family holding one encoded snapshot per height
const CF_SNAPSHOTS: &str = "snapshots";

/// Key for a snapshot height. Big-endian so that RocksDB's byte order is
/// height order.
#[cfg_attr(not(feature = "rocksdb"), allow(dead_code))]
fn height_key(height: i64) -> [u8; 8] {
    (height as u64).to_be_bytes()
}

#[cfg_attr(not(feature = "rocksdb"), allow(dead_code))]
fn parse_height_key(key: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    i64::try_from(u64::from_be_bytes(bytes)).ok()
}

#[cfg(feature = "rocksdb")]
/// RocksDB implementation of SnapshotStore
pub struct RocksDbSnapshotStore {
    db: DB,
    db_path: PathBuf,
}

#[cfg(feature = "rocksdb")]
impl RocksDbSnapshotStore {
    /// Opens (creating if needed) a snapshot database at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db_path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_snapshots = ColumnFamilyDescriptor::new(CF_SNAPSHOTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, &db_path, vec![cf_snapshots])
            .with_context(|| format!("Failed to open RocksDB database at {:?}", db_path))?;

        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn snapshots_cf(&self) -> Result<&ColumnFamily, StorageError> {
        self.db.cf_handle(CF_SNAPSHOTS).ok_or_else(|| {
            StorageError::Database("Snapshots column family not found".to_string())
        })
    }
}

#[cfg(feature = "rocksdb")]
impl SnapshotStore for RocksDbSnapshotStore {
    fn put(&self, snapshot: &BlockSnapshot) -> Result<(), StorageError> {
        check_height(snapshot.height)?;
        let cf = self.snapshots_cf()?;
        let key = height_key(snapshot.height);

        let existing = self
            .db
            .get_cf(cf, key)
            .with_context(|| format!("Failed to read snapshot at height {}", snapshot.height))?;
        if existing.is_some() {
            return Err(already_exists(snapshot.height));
        }

        let bytes = encode_snapshot(snapshot)?;
        self.db
            .put_cf(cf, key, bytes)
            .with_context(|| format!("Failed to store snapshot at height {}", snapshot.height))?;
        Ok(())
    }

    fn get(&self, height: i64) -> Result<Option<BlockSnapshot>, StorageError> {
        let cf = self.snapshots_cf()?;
        let bytes = self
            .db
            .get_cf(cf, height_key(height))
            .with_context(|| format!("Failed to read snapshot at height {}", height))?;

        match bytes {
            Some(bytes) => {
                let snapshot = decode_snapshot(&bytes).map_err(|e| {
                    warn!("Snapshot at height {} failed verification: {}", height, e);
                    e
                })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn remove(&self, height: i64) -> Result<bool, StorageError> {
        let cf = self.snapshots_cf()?;
        let key = height_key(height);
        let existed = self
            .db
            .get_cf(cf, key)
            .with_context(|| format!("Failed to read snapshot at height {}", height))?
            .is_some();
        if existed {
            self.db
                .delete_cf(cf, key)
                .with_context(|| format!("Failed to delete snapshot at height {}", height))?;
        }
        Ok(existed)
    }

    fn heights(&self) -> Result<Vec<i64>, StorageError> {
        let cf = self.snapshots_cf()?;
        let mut heights = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.context("Failed to iterate snapshots")?;
            match parse_height_key(&key) {
                Some(height) => heights.push(height),
                None => warn!("Ignoring malformed snapshot key {:?}", key),
            }
        }
        Ok(heights)
    }

    fn latest(&self) -> Result<Option<BlockSnapshot>, StorageError> {
        let cf = self.snapshots_cf()?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, value) = item.context("Failed to read latest snapshot")?;
                let snapshot = decode_snapshot(&value)?;
                if parse_height_key(&key) != Some(snapshot.height) {
                    return Err(StorageError::Corrupted(format!(
                        "Snapshot key does not match stored height {}",
                        snapshot.height
                    )));
                }
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}
