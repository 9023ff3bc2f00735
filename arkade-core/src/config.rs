use crate::codec::CodecLimits;
use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of confirmations an on-chain teleport needs before it can be claimed
pub const DEFAULT_MIN_CONFIRMATIONS: u32 = 6;

/// Number of groups a 16-bit group index can address
pub const MAX_ADDRESSABLE_GROUPS: usize = u16::MAX as usize + 1;

/// What to do with a transaction whose asset record is present but cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPacketPolicy {
    /// Treat the transaction as carrying no packet (implicit burn)
    #[default]
    Burn,
    /// Fail the transaction and with it the whole block
    RejectBlock,
}

/// Validator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Confirmations required before an on-chain teleport can be claimed
    pub min_confirmations: u32,

    pub malformed_packet: MalformedPacketPolicy,

    /// Upper bound on groups per packet
    pub max_groups: usize,

    /// Upper bound on metadata entries per group
    pub max_metadata_entries: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let limits = CodecLimits::default();
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            malformed_packet: MalformedPacketPolicy::default(),
            max_groups: limits.max_groups,
            max_metadata_entries: limits.max_metadata_entries,
        }
    }
}

impl ValidatorConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Decode bounds. Group indices are 16-bit, so the group bound never
    /// exceeds the number of addressable groups.
    pub fn codec_limits(&self) -> CodecLimits {
        CodecLimits {
            max_groups: self.max_groups.min(MAX_ADDRESSABLE_GROUPS),
            max_metadata_entries: self.max_metadata_entries,
        }
    }
}
