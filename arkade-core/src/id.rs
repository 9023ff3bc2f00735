use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

// Txid identifies a transaction by its 32 byte hash, kept in internal byte
// order. Display reverses the bytes the way Bitcoin tooling prints txids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Txid([u8; 32]);

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl Deref for Txid {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; 32]> for Txid {
    fn from(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }
}

impl Txid {
    pub fn new(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }

    /// Get a reference to the internal bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse a txid from its displayed (byte-reversed) hex form
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes: [u8; 32] = hex::decode(s).ok()?.try_into().ok()?;
        bytes.reverse();
        Some(Txid(bytes))
    }
}

/// Reference to a transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Permanent identity of an asset: the transaction that minted it and the
/// index of the minting group inside that transaction's packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId {
    pub genesis_txid: Txid,
    pub group_index: u16,
}

impl AssetId {
    pub fn new(genesis_txid: Txid, group_index: u16) -> Self {
        Self {
            genesis_txid,
            group_index,
        }
    }

    /// Serialize to the 34 byte wire form: txid followed by the little-endian index
    pub fn to_bytes(&self) -> [u8; 34] {
        let mut out = [0u8; 34];
        out[..32].copy_from_slice(self.genesis_txid.bytes());
        out[32..].copy_from_slice(&self.group_index.to_le_bytes());
        out
    }

    /// Inverse of [`AssetId::to_bytes`]
    pub fn from_bytes(bytes: &[u8; 34]) -> Self {
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&bytes[..32]);
        let group_index = u16::from_le_bytes([bytes[32], bytes[33]]);
        Self::new(Txid(txid), group_index)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.genesis_txid, self.group_index)
    }
}
