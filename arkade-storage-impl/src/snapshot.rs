use arkade_core::error::StorageError;
use arkade_core::state::AssetState;
use arkade_proofs::{checksum, state_root};
use serde::{Deserialize, Serialize};

/// Height of the implicit empty snapshot that precedes the first block
pub const GENESIS_HEIGHT: i64 = -1;

const LEN_PREFIX: usize = 8;
const CHECKSUM_LEN: usize = 32;

/// Committed asset state after the block at `height`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub height: i64,
    pub state: AssetState,
    pub state_root: [u8; 32],
}

impl BlockSnapshot {
    /// Create a snapshot, computing its state root
    pub fn new(height: i64, state: AssetState) -> Result<Self, StorageError> {
        let state_root = state_root(&state)?;
        Ok(Self {
            height,
            state,
            state_root,
        })
    }

    /// The empty state before any block
    pub fn genesis() -> Result<Self, StorageError> {
        Self::new(GENESIS_HEIGHT, AssetState::new())
    }

    pub fn is_genesis(&self) -> bool {
        self.height == GENESIS_HEIGHT
    }

    /// Recompute the state root and compare it with the stored one
    pub fn verify_root(&self) -> Result<bool, StorageError> {
        Ok(state_root(&self.state)? == self.state_root)
    }
}

/// Serialize a snapshot as `len:u64le || bincode || checksum[32]`
pub fn encode_snapshot(snapshot: &BlockSnapshot) -> Result<Vec<u8>, StorageError> {
    let body = bincode::serialize(snapshot)?;
    let mut out = Vec::with_capacity(LEN_PREFIX + body.len() + CHECKSUM_LEN);
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&checksum(&body));
    Ok(out)
}

/// Parse bytes written by [`encode_snapshot`], verifying the checksum
pub fn decode_snapshot(bytes: &[u8]) -> Result<BlockSnapshot, StorageError> {
    if bytes.len() < LEN_PREFIX + CHECKSUM_LEN {
        return Err(StorageError::Corrupted(format!(
            "Snapshot record too short: {} bytes",
            bytes.len()
        )));
    }

    let mut len_buf = [0u8; LEN_PREFIX];
    len_buf.copy_from_slice(&bytes[..LEN_PREFIX]);
    let body_len = u64::from_le_bytes(len_buf);
    let expected_len = (LEN_PREFIX + CHECKSUM_LEN) as u64 + body_len;
    if bytes.len() as u64 != expected_len {
        return Err(StorageError::Corrupted(format!(
            "Snapshot record length mismatch: expected {} bytes, found {}",
            expected_len,
            bytes.len()
        )));
    }

    let body = &bytes[LEN_PREFIX..bytes.len() - CHECKSUM_LEN];
    let stored = &bytes[bytes.len() - CHECKSUM_LEN..];
    if checksum(body)[..] != *stored {
        return Err(StorageError::Corrupted(
            "Snapshot checksum mismatch".to_string(),
        ));
    }

    Ok(bincode::deserialize(body)?)
}
