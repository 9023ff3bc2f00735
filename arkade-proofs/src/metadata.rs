use crate::tagged::{tagged_hash, TAG_METADATA_BRANCH, TAG_METADATA_LEAF};
use arkade_core::codec::write_compact_size;
use arkade_core::packet::Metadata;
use serde::{Deserialize, Serialize};

/// Digest of an empty metadata map
pub const EMPTY_METADATA_HASH: [u8; 32] = [0u8; 32];

/// Tagged-hash tree over a metadata map
///
/// Leaves are taken in key order. Each level pairs adjacent nodes and an odd
/// trailing node is promoted unchanged. Branch children are sorted by hash
/// before hashing, so inclusion proofs need no direction bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataHasher;

/// Inclusion proof of one metadata entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataProof {
    /// Sibling hashes from the leaf level upward; promoted levels contribute none
    pub siblings: Vec<[u8; 32]>,
}

impl MetadataHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash one key/value entry
    pub fn leaf(key: &str, value: &str) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(key.len() + value.len() + 2);
        write_compact_size(&mut preimage, key.len() as u64);
        preimage.extend_from_slice(key.as_bytes());
        write_compact_size(&mut preimage, value.len() as u64);
        preimage.extend_from_slice(value.as_bytes());
        tagged_hash(TAG_METADATA_LEAF, &[&preimage])
    }

    /// Hash two children, smaller hash first
    pub fn branch(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        tagged_hash(TAG_METADATA_BRANCH, &[left, right])
    }

    /// Root of the tree over `metadata`
    pub fn hash(&self, metadata: &Metadata) -> [u8; 32] {
        let mut level: Vec<[u8; 32]> = metadata
            .iter()
            .map(|(key, value)| Self::leaf(key, value))
            .collect();
        if level.is_empty() {
            return EMPTY_METADATA_HASH;
        }

        while level.len() > 1 {
            level = next_level(&level);
        }
        level[0]
    }

    /// Build an inclusion proof for `key`
    pub fn prove(&self, metadata: &Metadata, key: &str) -> Option<MetadataProof> {
        let mut index = metadata.keys().position(|k| k == key)?;
        let mut level: Vec<[u8; 32]> = metadata
            .iter()
            .map(|(key, value)| Self::leaf(key, value))
            .collect();

        let mut siblings = Vec::new();
        while level.len() > 1 {
            let sibling = if index % 2 == 0 { index + 1 } else { index - 1 };
            if let Some(hash) = level.get(sibling) {
                siblings.push(*hash);
            }
            level = next_level(&level);
            index /= 2;
        }

        Some(MetadataProof { siblings })
    }

    /// Check that `key = value` is part of the map committed to by `root`
    pub fn verify(&self, root: &[u8; 32], key: &str, value: &str, proof: &MetadataProof) -> bool {
        let computed = proof
            .siblings
            .iter()
            .fold(Self::leaf(key, value), |node, sibling| Self::branch(&node, sibling));
        computed == *root
    }
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [a, b] => MetadataHasher::branch(a, b),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two nodes"),
        })
        .collect()
}
