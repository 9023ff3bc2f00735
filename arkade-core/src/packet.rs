use crate::id::AssetId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered key/value metadata attached to an asset
pub type Metadata = BTreeMap<String, String>;

/// Teleport commitment: tagged hash over a nonce and the destination script
pub type Commitment = [u8; 32];

/// Reference to a control asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetRef {
    /// An asset minted by any earlier transaction
    ById(AssetId),
    /// A group of the same packet, resolved to that group's asset
    ByGroup(u16),
}

/// Source of asset units consumed by a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetInput {
    /// Units held by the UTXO spent at input `vin` of the transaction
    Local { vin: u16, amount: u64 },
    /// Units claimed from a pending teleport. The nonce reveals which output
    /// script the commitment was made to.
    Teleport {
        commitment: Commitment,
        nonce: [u8; 32],
        amount: u64,
    },
}

impl AssetInput {
    pub fn amount(&self) -> u64 {
        match self {
            AssetInput::Local { amount, .. } | AssetInput::Teleport { amount, .. } => *amount,
        }
    }
}

/// Destination of asset units produced by a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetOutput {
    /// Units assigned to output `vout` of the transaction
    Local { vout: u16, amount: u64 },
    /// Units sent to a pending teleport claimable by a later transaction
    Teleport { commitment: Commitment, amount: u64 },
}

impl AssetOutput {
    pub fn amount(&self) -> u64 {
        match self {
            AssetOutput::Local { amount, .. } | AssetOutput::Teleport { amount, .. } => *amount,
        }
    }
}

/// One asset operation (mint, transfer, burn or reissue) inside a packet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Group {
    /// Asset operated on. `None` mints a fresh asset identified by the
    /// enclosing transaction and this group's index.
    pub asset_id: Option<AssetId>,

    /// Asset authorizing future supply increases (genesis only)
    pub control_asset: Option<AssetRef>,

    /// Initial metadata at genesis, or a metadata update for an existing asset
    pub metadata: Option<Metadata>,

    /// Freeze metadata forever (genesis only)
    pub immutable: bool,

    pub inputs: Vec<AssetInput>,
    pub outputs: Vec<AssetOutput>,
}

impl Group {
    /// A fresh group mints a new asset
    pub fn is_fresh(&self) -> bool {
        self.asset_id.is_none()
    }

    /// Sum of input amounts, `None` on overflow
    pub fn sum_inputs(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.amount()))
    }

    /// Sum of output amounts, `None` on overflow
    pub fn sum_outputs(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.amount()))
    }
}

/// A decoded asset packet: the ordered groups of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub groups: Vec<Group>,
}

impl Packet {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
