use crate::id::{AssetId, OutPoint, Txid};
use std::io;
use thiserror::Error;

/// Errors produced while decoding an asset record or packet
///
/// Every variant is local to one candidate record: a decode error never
/// prevents other carriers of the same transaction from being scanned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before a field was complete
    #[error("Truncated input: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// The carrier data does not start with the `ARK` magic
    #[error("Missing ARK magic prefix")]
    BadMagic,

    /// A record type that cannot be skipped is not understood
    #[error("Unknown non-skippable record type 0x{0:02x}")]
    UnknownRecordType(u8),

    /// A variant marker is not valid for the field type it prefixes
    #[error("Invalid {field} marker 0x{marker:02x}")]
    InvalidMarker { field: &'static str, marker: u8 },

    /// Bytes remain after the last group of a packet
    #[error("{0} trailing bytes after last group")]
    TrailingBytes(usize),

    /// A bit reserved for future use was set
    #[error("Reserved bits set in group presence byte: 0x{0:02x}")]
    ReservedBits(u8),

    /// A CompactSize integer was not minimally encoded
    #[error("Non-canonical CompactSize encoding at offset {0}")]
    NonCanonicalVarint(usize),

    /// A metadata key or value is not valid UTF-8
    #[error("Metadata string is not valid UTF-8")]
    InvalidUtf8,

    /// The same metadata key appears twice in one group
    #[error("Duplicate metadata key: {0}")]
    DuplicateMetadataKey(String),

    /// A packet declared zero groups
    #[error("Packet contains no groups")]
    EmptyPacket,

    /// A packet declared more groups than the configured bound
    #[error("Packet declares {count} groups, limit is {limit}")]
    TooManyGroups { count: u64, limit: usize },

    /// A metadata map declared more entries than the configured bound
    #[error("Metadata declares {count} entries, limit is {limit}")]
    TooManyMetadataEntries { count: u64, limit: usize },

    /// A length or count does not fit the host's address space
    #[error("Length {0} does not fit in memory")]
    LengthOverflow(u64),
}

/// Errors produced while resolving intra-packet asset references
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A `ByGroup` reference points past the last group of the packet
    #[error("Group {group} references group {target}, but the packet has {group_count} groups")]
    OutOfRangeGroupIndex {
        group: u16,
        target: u16,
        group_count: usize,
    },

    /// A packet holds more groups than a 16-bit index can address
    #[error("Packet has {0} groups, more than a group index can address")]
    TooManyGroups(usize),

    /// A group's control asset resolves to the group's own asset
    #[error("Group {group} names its own asset {asset} as control asset")]
    SelfControlReference { group: u16, asset: AssetId },
}

/// Errors raised by the teleport ledger itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeleportError {
    /// No pending teleport exists for the commitment
    #[error("Unknown teleport commitment {0}")]
    Unknown(String),

    /// The teleport was already claimed by an earlier transaction
    #[error("Teleport {commitment} already claimed by {claimed_by}")]
    AlreadyClaimed { commitment: String, claimed_by: Txid },

    /// A live teleport already uses this commitment
    #[error("Teleport commitment {0} is already pending")]
    DuplicateCommitment(String),
}

/// Errors raised while validating one group of a resolved packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The candidate asset record was present but could not be decoded
    #[error("Malformed asset packet: {0}")]
    MalformedPacket(#[from] DecodeError),

    /// Reference resolution failed before any balance check
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Group {group}: zero amount in {field}")]
    ZeroAmount { group: u16, field: &'static str },

    #[error("Group {group}: amount overflow")]
    AmountOverflow { group: u16 },

    #[error("Balance of {asset} on {outpoint} overflows")]
    BalanceOverflow { outpoint: OutPoint, asset: AssetId },

    #[error("Group {group}: input index {vin} out of bounds ({count} inputs)")]
    InputIndexOutOfBounds { group: u16, vin: u16, count: usize },

    #[error("Group {group}: output index {vout} out of bounds ({count} outputs)")]
    OutputIndexOutOfBounds { group: u16, vout: u16, count: usize },

    #[error("Group {group}: input {vin} claimed more than once for {asset}")]
    DuplicateInput { group: u16, vin: u16, asset: AssetId },

    #[error("Group {group}: output {vout} assigned more than once")]
    DuplicateOutput { group: u16, vout: u16 },

    #[error("Groups {first} and {second} both operate on {asset}")]
    DuplicateAssetGroup {
        first: u16,
        second: u16,
        asset: AssetId,
    },

    #[error("Group {group}: input {vin} ({outpoint}) holds {available} of {asset}, {claimed} claimed")]
    InsufficientInputBalance {
        group: u16,
        vin: u16,
        outpoint: OutPoint,
        asset: AssetId,
        available: u64,
        claimed: u64,
    },

    #[error("Group {group}: unknown asset {asset}")]
    UnknownAsset { group: u16, asset: AssetId },

    #[error("Group {group}: supply increase of {asset} without its control asset in the packet")]
    MissingControlAssetForIssuance { group: u16, asset: AssetId },

    #[error("Group {group}: control asset {control} is not retained by the packet")]
    ControlAssetNotRetained { group: u16, control: AssetId },

    /// The control group must consume held units, not just name the asset
    #[error("Group {group}: control asset {control} is present but none of it is spent")]
    ControlAssetNotSpent { group: u16, control: AssetId },

    #[error("Group {group}: genesis-only field {field} on existing asset")]
    GenesisOnlyField { group: u16, field: &'static str },

    #[error("Group {group}: metadata update of {asset} without spending its control asset")]
    UnauthorizedMetadataUpdate { group: u16, asset: AssetId },

    #[error("Group {group}: metadata of {asset} is immutable")]
    ImmutableMetadata { group: u16, asset: AssetId },

    #[error("Group {group}: {source}")]
    UnknownOrAlreadyClaimedTeleport { group: u16, source: TeleportError },

    #[error("Group {group}: teleport {commitment} carries {expected}, claim declares {claimed}")]
    TeleportAmountMismatch {
        group: u16,
        commitment: String,
        expected: u64,
        claimed: u64,
    },

    #[error("Group {group}: teleport {commitment} carries {expected}, not {claimed}")]
    TeleportAssetMismatch {
        group: u16,
        commitment: String,
        expected: AssetId,
        claimed: AssetId,
    },

    #[error("Group {group}: no output of the group matches teleport {commitment}")]
    TeleportDestinationMismatch { group: u16, commitment: String },

    #[error("Group {group}: teleport {commitment} has {confirmations} confirmations, {required} required")]
    TeleportNotConfirmed {
        group: u16,
        commitment: String,
        confirmations: u64,
        required: u32,
    },

    #[error("Group {group}: teleport commitment {commitment} is already pending")]
    DuplicateTeleportCommitment { group: u16, commitment: String },
}

/// Represents all possible errors that can occur when interacting with snapshot storage
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO errors that occur when reading/writing files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Database errors that occur with the underlying storage backend
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored snapshot failed its integrity check
    #[error("Corrupted snapshot: {0}")]
    Corrupted(String),

    /// Generic errors that don't fit in other categories
    #[error("Other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        StorageError::Other(err)
    }
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        StorageError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_wraps_decode_error() {
        let err: ValidationError = DecodeError::EmptyPacket.into();
        assert!(matches!(err, ValidationError::MalformedPacket(DecodeError::EmptyPacket)));
        assert_eq!(err.to_string(), "Malformed asset packet: Packet contains no groups");
    }

    #[test]
    fn test_storage_error_from_str() {
        let err: StorageError = "boom".into();
        assert!(matches!(err, StorageError::Other(ref m) if m == "boom"));
    }
}
