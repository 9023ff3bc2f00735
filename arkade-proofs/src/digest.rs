use arkade_core::state::AssetState;

/// Digest of a full asset state
///
/// The state serializes deterministically (ordered maps only), so equal states
/// always produce equal roots.
pub fn state_root(state: &AssetState) -> Result<[u8; 32], bincode::Error> {
    let encoded = bincode::serialize(state)?;
    Ok(checksum(&encoded))
}

/// blake3 checksum of arbitrary bytes
pub fn checksum(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"ARKADE_STATE:");
    hasher.update(bytes);
    *hasher.finalize().as_bytes()
}
