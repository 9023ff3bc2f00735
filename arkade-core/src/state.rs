use crate::error::ValidationError;
use crate::id::{AssetId, OutPoint};
use crate::packet::Metadata;
use crate::teleport::TeleportLedger;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Units of one asset held by one UTXO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: AssetId,
    pub amount: u64,
}

/// Everything known about an asset besides its balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub asset_id: AssetId,

    /// Asset whose presence authorizes supply increases. Cleared for good once
    /// the control asset's supply reaches zero.
    pub control_asset: Option<AssetId>,

    pub metadata: Metadata,

    /// Tagged-hash tree root over `metadata`
    pub metadata_hash: [u8; 32],

    /// Metadata can never be updated
    pub immutable: bool,

    /// Height of the block that minted the asset
    pub genesis_height: i64,
}

/// The logical asset state: definitions, balances per UTXO and the teleport
/// ledger. Maps are ordered so that serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetState {
    definitions: BTreeMap<AssetId, AssetDefinition>,
    utxos: BTreeMap<OutPoint, BTreeMap<AssetId, u64>>,
    teleports: TeleportLedger,
    /// Units per asset held by UTXOs
    held: BTreeMap<AssetId, u128>,
    /// Control asset to the assets it controls
    dependents: BTreeMap<AssetId, BTreeSet<AssetId>>,
}

impl AssetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition(&self, asset_id: &AssetId) -> Option<&AssetDefinition> {
        self.definitions.get(asset_id)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &AssetDefinition> {
        self.definitions.values()
    }

    pub fn insert_definition(&mut self, definition: AssetDefinition) {
        let asset_id = definition.asset_id;
        if let Some(control) = definition.control_asset {
            self.dependents.entry(control).or_default().insert(asset_id);
        }
        if let Some(previous) = self.definitions.insert(asset_id, definition) {
            if let Some(control) = previous.control_asset {
                if self.definitions[&asset_id].control_asset != Some(control) {
                    self.remove_dependent(&control, &asset_id);
                }
            }
        }
    }

    fn remove_dependent(&mut self, control: &AssetId, asset_id: &AssetId) {
        if let Some(assets) = self.dependents.get_mut(control) {
            assets.remove(asset_id);
            if assets.is_empty() {
                self.dependents.remove(control);
            }
        }
    }

    /// Replace the metadata of an existing asset. Returns false if unknown.
    pub fn update_metadata(
        &mut self,
        asset_id: &AssetId,
        metadata: Metadata,
        metadata_hash: [u8; 32],
    ) -> bool {
        match self.definitions.get_mut(asset_id) {
            Some(definition) => {
                definition.metadata = metadata;
                definition.metadata_hash = metadata_hash;
                true
            }
            None => false,
        }
    }

    /// Records held by an outpoint
    pub fn records(&self, outpoint: &OutPoint) -> Vec<AssetRecord> {
        self.utxos
            .get(outpoint)
            .map(|assets| {
                assets
                    .iter()
                    .map(|(asset_id, amount)| AssetRecord {
                        asset_id: *asset_id,
                        amount: *amount,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Balance of `asset_id` held by `outpoint`
    pub fn balance(&self, outpoint: &OutPoint, asset_id: &AssetId) -> u64 {
        self.utxos
            .get(outpoint)
            .and_then(|assets| assets.get(asset_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn holds_assets(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    pub fn utxo_count(&self) -> usize {
        self.utxos.len()
    }

    /// Add units to an outpoint. Fails without changing anything if the
    /// outpoint's balance would overflow.
    pub fn credit(
        &mut self,
        outpoint: OutPoint,
        asset_id: AssetId,
        amount: u64,
    ) -> Result<(), ValidationError> {
        let slot = self
            .utxos
            .entry(outpoint)
            .or_default()
            .entry(asset_id)
            .or_insert(0);
        *slot = slot
            .checked_add(amount)
            .ok_or(ValidationError::BalanceOverflow {
                outpoint,
                asset: asset_id,
            })?;
        *self.held.entry(asset_id).or_insert(0) += amount as u128;
        Ok(())
    }

    /// Remove every record of a spent outpoint and return them
    pub fn spend(&mut self, outpoint: &OutPoint) -> Vec<AssetRecord> {
        let Some(assets) = self.utxos.remove(outpoint) else {
            return Vec::new();
        };

        let mut records = Vec::with_capacity(assets.len());
        for (asset_id, amount) in assets {
            if let Some(held) = self.held.get_mut(&asset_id) {
                *held = held.saturating_sub(amount as u128);
                if *held == 0 {
                    self.held.remove(&asset_id);
                }
            }
            records.push(AssetRecord { asset_id, amount });
        }
        records
    }

    /// Live supply of an asset: units held by UTXOs plus units in unclaimed teleports
    pub fn total_supply(&self, asset_id: &AssetId) -> u128 {
        let held = self.held.get(asset_id).copied().unwrap_or(0);
        held + self.teleports.pending_amount(asset_id)
    }

    /// Clear the control asset of every asset controlled by one of `touched`
    /// whose supply is now zero. Only assets whose supply can have dropped
    /// need to be passed. Returns the assets whose supply became final.
    pub fn finalize_exhausted_controls<I>(&mut self, touched: I) -> Vec<AssetId>
    where
        I: IntoIterator<Item = AssetId>,
    {
        let exhausted: BTreeSet<AssetId> = touched
            .into_iter()
            .filter(|control| self.dependents.contains_key(control))
            .filter(|control| self.total_supply(control) == 0)
            .collect();

        let mut finalized = Vec::new();
        for control in exhausted {
            for asset_id in self.dependents.remove(&control).unwrap_or_default() {
                if let Some(definition) = self.definitions.get_mut(&asset_id) {
                    definition.control_asset = None;
                    finalized.push(asset_id);
                }
            }
        }
        finalized.sort();
        finalized
    }

    pub fn teleports(&self) -> &TeleportLedger {
        &self.teleports
    }

    pub fn teleports_mut(&mut self) -> &mut TeleportLedger {
        &mut self.teleports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::tests::txid;
    use crate::teleport::TeleportOrigin;

    fn definition(asset_id: AssetId, control_asset: Option<AssetId>) -> AssetDefinition {
        AssetDefinition {
            asset_id,
            control_asset,
            metadata: Metadata::new(),
            metadata_hash: [0; 32],
            immutable: false,
            genesis_height: 0,
        }
    }

    #[test]
    fn test_credit_and_spend() {
        let mut state = AssetState::new();
        let outpoint = OutPoint::new(txid(1), 0);
        let a = AssetId::new(txid(9), 0);
        let b = AssetId::new(txid(9), 1);

        state.credit(outpoint, a, 10).unwrap();
        state.credit(outpoint, b, 3).unwrap();
        assert_eq!(state.balance(&outpoint, &a), 10);
        assert_eq!(state.records(&outpoint).len(), 2);
        assert_eq!(state.total_supply(&a), 10);

        let spent = state.spend(&outpoint);
        assert_eq!(spent.len(), 2);
        assert!(!state.holds_assets(&outpoint));
        assert_eq!(state.total_supply(&a), 0);
    }

    #[test]
    fn test_finalize_exhausted_controls() {
        let mut state = AssetState::new();
        let control = AssetId::new(txid(1), 0);
        let asset = AssetId::new(txid(1), 1);
        let control_utxo = OutPoint::new(txid(1), 0);

        state.insert_definition(definition(control, None));
        state.insert_definition(definition(asset, Some(control)));
        state.credit(control_utxo, control, 1).unwrap();

        assert!(state.finalize_exhausted_controls([control]).is_empty());
        assert_eq!(state.definition(&asset).unwrap().control_asset, Some(control));

        state.spend(&control_utxo);
        // Assets that were not touched are not looked at
        assert!(state.finalize_exhausted_controls([asset]).is_empty());
        assert_eq!(state.finalize_exhausted_controls([control]), vec![asset]);
        assert_eq!(state.definition(&asset).unwrap().control_asset, None);
        assert!(state.finalize_exhausted_controls([control]).is_empty());
    }

    #[test]
    fn test_teleported_control_is_not_exhausted() {
        let mut state = AssetState::new();
        let control = AssetId::new(txid(1), 0);
        let asset = AssetId::new(txid(1), 1);
        state.insert_definition(definition(asset, Some(control)));
        state
            .teleports_mut()
            .create([4; 32], control, 1, TeleportOrigin::ArkadeNative, txid(2))
            .unwrap();

        assert_eq!(state.total_supply(&control), 1);
        assert!(state.finalize_exhausted_controls([control]).is_empty());
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let mut state = AssetState::new();
        let outpoint = OutPoint::new(txid(1), 0);
        let asset = AssetId::new(txid(9), 0);

        state.credit(outpoint, asset, u64::MAX).unwrap();
        assert_eq!(
            state.credit(outpoint, asset, 1),
            Err(ValidationError::BalanceOverflow { outpoint, asset })
        );
        assert_eq!(state.balance(&outpoint, &asset), u64::MAX);
        assert_eq!(state.total_supply(&asset), u64::MAX as u128);
    }

    #[test]
    fn test_supply_index_follows_balances() {
        let mut state = AssetState::new();
        let asset = AssetId::new(txid(9), 0);
        let first = OutPoint::new(txid(1), 0);
        let second = OutPoint::new(txid(1), 1);

        state.credit(first, asset, u64::MAX).unwrap();
        state.credit(second, asset, 5).unwrap();
        assert_eq!(state.total_supply(&asset), u64::MAX as u128 + 5);

        state.spend(&first);
        assert_eq!(state.total_supply(&asset), 5);
        state.spend(&second);
        assert_eq!(state.total_supply(&asset), 0);
        assert_eq!(state, AssetState::new());
    }

    #[test]
    fn test_redefining_control_updates_dependents() {
        let mut state = AssetState::new();
        let old_control = AssetId::new(txid(1), 0);
        let new_control = AssetId::new(txid(1), 1);
        let asset = AssetId::new(txid(1), 2);

        state.insert_definition(definition(asset, Some(old_control)));
        state.insert_definition(definition(asset, Some(new_control)));

        assert!(state.finalize_exhausted_controls([old_control]).is_empty());
        assert_eq!(state.finalize_exhausted_controls([new_control]), vec![asset]);
    }
}
