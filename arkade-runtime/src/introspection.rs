//! Values exposed to script introspection for an applied packet

use crate::resolver::ResolvedPacket;
use crate::validator::GroupEffect;
use arkade_core::id::AssetId;
use arkade_core::state::AssetRecord;
use arkade_transaction::TransactionView;
use serde::{Deserialize, Serialize};

/// Per-group values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIntrospection {
    pub asset_id: AssetId,
    pub sum_in: u64,
    pub sum_out: u64,
    /// `sum_out - sum_in`: positive on issuance, negative on burn
    pub delta: i128,
    pub metadata_hash: [u8; 32],
    pub control_asset: Option<AssetId>,
}

/// Asset view of one transaction as seen by scripts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketIntrospection {
    pub groups: Vec<GroupIntrospection>,
    /// Assets declared against each transaction input, indexed by vin
    pub inputs: Vec<Vec<AssetRecord>>,
    /// Assets assigned to each transaction output, indexed by vout
    pub outputs: Vec<Vec<AssetRecord>>,
}

impl PacketIntrospection {
    /// Build the introspection values of a validated packet
    ///
    /// # Parameters
    /// * `resolved` - The resolved packet
    /// * `effects` - The validated effects, one per group in packet order
    /// * `tx` - The transaction carrying the packet
    pub fn build(
        resolved: &ResolvedPacket<'_>,
        effects: &[GroupEffect],
        tx: &TransactionView,
    ) -> Self {
        let mut inputs = vec![Vec::new(); tx.inputs.len()];
        let mut outputs = vec![Vec::new(); tx.outputs.len()];
        let mut groups = Vec::with_capacity(resolved.group_count());

        for effect in effects {
            groups.push(GroupIntrospection {
                asset_id: effect.asset_id,
                sum_in: effect.sum_in,
                sum_out: effect.sum_out,
                delta: effect.delta(),
                metadata_hash: effect.metadata_hash,
                control_asset: effect.control_asset,
            });

            for (vin, amount) in &effect.local_inputs {
                if let Some(slot) = inputs.get_mut(*vin as usize) {
                    slot.push(AssetRecord {
                        asset_id: effect.asset_id,
                        amount: *amount,
                    });
                }
            }
            for (vout, amount) in &effect.credits {
                if let Some(slot) = outputs.get_mut(*vout as usize) {
                    slot.push(AssetRecord {
                        asset_id: effect.asset_id,
                        amount: *amount,
                    });
                }
            }
        }

        Self {
            groups,
            inputs,
            outputs,
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, index: usize) -> Option<&GroupIntrospection> {
        self.groups.get(index)
    }

    /// Values of the group operating on `asset_id`
    pub fn find_group(&self, asset_id: &AssetId) -> Option<&GroupIntrospection> {
        self.groups.iter().find(|group| group.asset_id == *asset_id)
    }

    pub fn input_assets(&self, vin: usize) -> &[AssetRecord] {
        self.inputs.get(vin).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn output_assets(&self, vout: usize) -> &[AssetRecord] {
        self.outputs.get(vout).map(Vec::as_slice).unwrap_or(&[])
    }
}
