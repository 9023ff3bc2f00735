pub mod file;
pub mod memory;
pub mod rocksdb;
pub mod snapshot;
pub mod storage_traits;

// Re-export the main types for convenience
pub use file::FileSnapshotStore;
pub use memory::InMemorySnapshotStore;
pub use snapshot::{decode_snapshot, encode_snapshot, BlockSnapshot, GENESIS_HEIGHT};
pub use storage_traits::SnapshotStore;

#[cfg(feature = "rocksdb")]
pub use rocksdb::RocksDbSnapshotStore;
