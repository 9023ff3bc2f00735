pub mod carrier;

use arkade_core::id::{OutPoint, Txid};
use arkade_core::teleport::ClaimPriority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use carrier::{carrier_data, op_return_script, select_packet, PacketSelection};

/// Classification supplied by the transaction-classification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TxClass {
    /// Regular transaction; spending asset UTXOs without a packet burns them
    #[default]
    Normal,
    /// Operator checkpoint or forfeit transaction, exempt from packet presence
    DefenseExempt,
}

/// How the transaction reached the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOrigin {
    /// Confirmed on chain at position `tx_index` of its block
    OnChain { tx_index: u32 },
    /// Accepted by the Arkade coordinator at `received_at`
    ArkadeNative { received_at: DateTime<Utc> },
}

/// A transaction output as seen by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub script_pubkey: Vec<u8>,
    pub value: u64,
}

impl TxOut {
    pub fn new(script_pubkey: Vec<u8>, value: u64) -> Self {
        Self {
            script_pubkey,
            value,
        }
    }
}

/// Read-only view of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub txid: Txid,
    /// Outpoints spent by the inputs, in input order
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOut>,
    pub class: TxClass,
    pub origin: TxOrigin,
}

impl TransactionView {
    /// A normal on-chain transaction
    pub fn new(txid: Txid, inputs: Vec<OutPoint>, outputs: Vec<TxOut>, tx_index: u32) -> Self {
        Self {
            txid,
            inputs,
            outputs,
            class: TxClass::Normal,
            origin: TxOrigin::OnChain { tx_index },
        }
    }

    pub fn with_class(mut self, class: TxClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_origin(mut self, origin: TxOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_defense_exempt(&self) -> bool {
        self.class == TxClass::DefenseExempt
    }

    /// Outpoint of output `vout` of this transaction
    pub fn outpoint(&self, vout: u32) -> OutPoint {
        OutPoint::new(self.txid, vout)
    }

    /// Precedence of the claims this transaction makes when included at `height`
    pub fn claim_priority(&self, height: i64) -> ClaimPriority {
        match self.origin {
            TxOrigin::OnChain { tx_index } => ClaimPriority::OnChain { height, tx_index },
            TxOrigin::ArkadeNative { received_at } => ClaimPriority::ArkadeNative {
                received_at,
                txid: self.txid,
            },
        }
    }
}
