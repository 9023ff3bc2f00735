pub mod digest;
pub mod metadata;
pub mod tagged;

// Re-export the main types for convenience
pub use digest::{checksum, state_root};
pub use metadata::{MetadataHasher, MetadataProof, EMPTY_METADATA_HASH};
pub use tagged::{tagged_hash, teleport_commitment};
