use arkade_core::packet::Commitment;
use sha2::{Digest, Sha256};

/// Tag for metadata tree leaves
pub const TAG_METADATA_LEAF: &str = "ArkadeAsset/leaf";

/// Tag for metadata tree branches
pub const TAG_METADATA_BRANCH: &str = "ArkadeAsset/branch";

/// Tag for teleport commitments
pub const TAG_TELEPORT: &str = "ArkadeAsset/teleport";

/// BIP-340 style tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || data)`
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Commitment a teleport output makes to its destination script
pub fn teleport_commitment(nonce: &[u8; 32], script_pubkey: &[u8]) -> Commitment {
    tagged_hash(TAG_TELEPORT, &[nonce, script_pubkey])
}
