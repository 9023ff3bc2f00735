use crate::error::TeleportError;
use crate::id::{AssetId, Txid};
use crate::packet::Commitment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a teleport was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeleportOrigin {
    /// Created by an off-chain Arkade transaction
    ArkadeNative,
    /// Created by a transaction confirmed in the block at `height`
    OnChain { height: i64 },
}

/// Precedence of a claim among competing claims for the same teleport
///
/// The derived ordering is the protocol's total order: every Arkade-native
/// claim precedes every on-chain claim, on-chain claims are ordered by block
/// height then position in the block, Arkade-native claims by the time the
/// coordinator accepted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClaimPriority {
    ArkadeNative {
        received_at: DateTime<Utc>,
        txid: Txid,
    },
    OnChain {
        height: i64,
        tx_index: u32,
    },
}

/// Lifecycle of a pending teleport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Created,
    /// Terminal
    Claimed { by: ClaimPriority, txid: Txid },
}

/// Asset units in flight between a teleport output and its claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTeleport {
    pub commitment: Commitment,
    pub asset_id: AssetId,
    pub amount: u64,
    pub origin: TeleportOrigin,
    /// Transaction holding the teleport output
    pub source_txid: Txid,
    pub status: ClaimStatus,
}

impl PendingTeleport {
    pub fn is_claimed(&self) -> bool {
        matches!(self.status, ClaimStatus::Claimed { .. })
    }

    /// Confirmations of the source at `height`. Arkade-native sources have no
    /// confirmation requirement and report `None`.
    pub fn confirmations(&self, height: i64) -> Option<u64> {
        match self.origin {
            TeleportOrigin::ArkadeNative => None,
            TeleportOrigin::OnChain { height: source } => {
                Some(if height >= source { (height - source + 1) as u64 } else { 0 })
            }
        }
    }
}

/// Ledger of teleports keyed by commitment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportLedger {
    entries: BTreeMap<Commitment, PendingTeleport>,
    /// Units per asset in entries still `Created`
    locked: BTreeMap<AssetId, u128>,
}

impl TeleportLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teleport output
    pub fn create(
        &mut self,
        commitment: Commitment,
        asset_id: AssetId,
        amount: u64,
        origin: TeleportOrigin,
        source_txid: Txid,
    ) -> Result<(), TeleportError> {
        if self.entries.contains_key(&commitment) {
            return Err(TeleportError::DuplicateCommitment(hex::encode(commitment)));
        }
        self.entries.insert(
            commitment,
            PendingTeleport {
                commitment,
                asset_id,
                amount,
                origin,
                source_txid,
                status: ClaimStatus::Created,
            },
        );
        *self.locked.entry(asset_id).or_insert(0) += amount as u128;
        Ok(())
    }

    pub fn get(&self, commitment: &Commitment) -> Option<&PendingTeleport> {
        self.entries.get(commitment)
    }

    /// Look up an entry that can still be claimed
    pub fn check_claim(&self, commitment: &Commitment) -> Result<&PendingTeleport, TeleportError> {
        let entry = self
            .entries
            .get(commitment)
            .ok_or_else(|| TeleportError::Unknown(hex::encode(commitment)))?;
        match entry.status {
            ClaimStatus::Created => Ok(entry),
            ClaimStatus::Claimed { txid, .. } => Err(TeleportError::AlreadyClaimed {
                commitment: hex::encode(commitment),
                claimed_by: txid,
            }),
        }
    }

    /// Move an entry to `Claimed`. The first claim applied wins; any later
    /// claim fails.
    pub fn claim(
        &mut self,
        commitment: &Commitment,
        by: ClaimPriority,
        txid: Txid,
    ) -> Result<&PendingTeleport, TeleportError> {
        self.check_claim(commitment)?;
        let entry = self
            .entries
            .get_mut(commitment)
            .ok_or_else(|| TeleportError::Unknown(hex::encode(commitment)))?;
        entry.status = ClaimStatus::Claimed { by, txid };

        if let Some(locked) = self.locked.get_mut(&entry.asset_id) {
            *locked = locked.saturating_sub(entry.amount as u128);
            if *locked == 0 {
                self.locked.remove(&entry.asset_id);
            }
        }
        Ok(&*entry)
    }

    /// Entries still waiting for a claim
    pub fn pending(&self) -> impl Iterator<Item = &PendingTeleport> {
        self.entries.values().filter(|entry| !entry.is_claimed())
    }

    /// Units of `asset_id` locked in unclaimed teleports
    pub fn pending_amount(&self, asset_id: &AssetId) -> u128 {
        self.locked.get(asset_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The claim that wins among competitors for one teleport
    pub fn winner(candidates: &[ClaimPriority]) -> Option<&ClaimPriority> {
        candidates.iter().min()
    }
}
