//! Application of a single transaction to the scratch state

use crate::introspection::PacketIntrospection;
use crate::resolver::ReferenceResolver;
use crate::validator::{DefinitionChange, GroupValidator, StateDelta, ValidationContext};
use arkade_core::codec::PacketCodec;
use arkade_core::config::MalformedPacketPolicy;
use arkade_core::error::{DecodeError, TeleportError, ValidationError};
use arkade_core::id::{AssetId, OutPoint, Txid};
use arkade_core::state::{AssetRecord, AssetState};
use arkade_core::teleport::TeleportOrigin;
use arkade_transaction::{select_packet, PacketSelection, TransactionView, TxOrigin};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// What happened to a transaction's packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// No asset packet was carried
    Absent,
    /// A packet record was present but undecodable and was treated as absent
    Malformed(DecodeError),
    /// The packet validated and was applied
    Applied(PacketIntrospection),
}

/// Result of applying one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub txid: Txid,
    pub packet: PacketOutcome,
    /// Units destroyed because they were spent without being re-assigned
    pub burned: Vec<AssetRecord>,
    /// Records moved to output 0 by a defense-exempt transaction
    pub carried: Vec<AssetRecord>,
    /// Assets whose control asset was released for good by this transaction
    pub finalized: Vec<AssetId>,
}

/// Applies transactions to a scratch state
pub struct TransactionApplier<'a> {
    codec: PacketCodec,
    resolver: ReferenceResolver,
    validator: &'a GroupValidator,
}

impl<'a> TransactionApplier<'a> {
    pub fn new(validator: &'a GroupValidator) -> Self {
        Self {
            codec: PacketCodec::new(validator.config().codec_limits()),
            resolver: ReferenceResolver::new(),
            validator,
        }
    }

    /// Apply `tx`, included in the block at `height`, to `state`
    ///
    /// On error `state` may be partially modified; callers discard it.
    pub fn apply(
        &self,
        state: &mut AssetState,
        tx: &TransactionView,
        height: i64,
    ) -> Result<TxOutcome, ValidationError> {
        match select_packet(tx, &self.codec) {
            PacketSelection::Absent => without_packet(state, tx, PacketOutcome::Absent),
            PacketSelection::Malformed(error) => match self.validator.config().malformed_packet {
                MalformedPacketPolicy::Burn => {
                    debug!("Tx {}: malformed asset packet treated as absent: {}", tx.txid, error);
                    without_packet(state, tx, PacketOutcome::Malformed(error))
                }
                MalformedPacketPolicy::RejectBlock => Err(ValidationError::MalformedPacket(error)),
            },
            PacketSelection::Present(packet) => {
                let resolved = self.resolver.resolve(&packet, tx.txid)?;
                let ctx = ValidationContext {
                    resolved: &resolved,
                    tx,
                    state: &*state,
                    height,
                };
                let delta = self.validator.validate_packet(&ctx)?;
                let introspection = PacketIntrospection::build(&resolved, &delta.effects, tx);

                let (burned, touched) = apply_delta(state, tx, &delta, height)?;
                let finalized = state.finalize_exhausted_controls(touched);
                if !finalized.is_empty() {
                    debug!("Tx {}: supply finalized for {:?}", tx.txid, finalized);
                }

                Ok(TxOutcome {
                    txid: tx.txid,
                    packet: PacketOutcome::Applied(introspection),
                    burned,
                    carried: Vec::new(),
                    finalized,
                })
            }
        }
    }
}

/// Handle a transaction that carries no usable packet
fn without_packet(
    state: &mut AssetState,
    tx: &TransactionView,
    packet: PacketOutcome,
) -> Result<TxOutcome, ValidationError> {
    let spent = spend_all(state, &tx.inputs);

    let mut outcome = TxOutcome {
        txid: tx.txid,
        packet,
        burned: Vec::new(),
        carried: Vec::new(),
        finalized: Vec::new(),
    };
    if spent.is_empty() {
        return Ok(outcome);
    }

    if tx.is_defense_exempt() && !tx.outputs.is_empty() {
        let destination = tx.outpoint(0);
        for record in &spent {
            state.credit(destination, record.asset_id, record.amount)?;
        }
        debug!("Tx {}: defense transaction carries {} records to output 0", tx.txid, spent.len());
        outcome.carried = spent;
    } else {
        debug!("Tx {}: implicit burn of {} records", tx.txid, spent.len());
        let touched: BTreeSet<AssetId> = spent.iter().map(|record| record.asset_id).collect();
        outcome.finalized = state.finalize_exhausted_controls(touched);
        outcome.burned = spent;
    }
    Ok(outcome)
}

/// Remove every record on the given outpoints, merged per asset
fn spend_all(state: &mut AssetState, inputs: &[OutPoint]) -> Vec<AssetRecord> {
    let mut spent = Vec::new();
    for outpoint in inputs {
        spent.extend(state.spend(outpoint));
    }
    merge_records(spent)
}

/// Merge records per asset, in asset order. A total that would pass
/// `u64::MAX` continues in a further record of the same asset.
fn merge_records(records: impl IntoIterator<Item = AssetRecord>) -> Vec<AssetRecord> {
    let mut totals: BTreeMap<AssetId, Vec<u64>> = BTreeMap::new();
    for record in records {
        if record.amount == 0 {
            continue;
        }
        let amounts = totals.entry(record.asset_id).or_default();
        match amounts.last_mut() {
            Some(last) if last.checked_add(record.amount).is_some() => *last += record.amount,
            _ => amounts.push(record.amount),
        }
    }

    totals
        .into_iter()
        .flat_map(|(asset_id, amounts)| {
            amounts
                .into_iter()
                .map(move |amount| AssetRecord { asset_id, amount })
        })
        .collect()
}

/// Apply a validated delta. Returns the units implicitly burned with the
/// spent UTXOs and every asset whose supply may have dropped.
fn apply_delta(
    state: &mut AssetState,
    tx: &TransactionView,
    delta: &StateDelta,
    height: i64,
) -> Result<(Vec<AssetRecord>, BTreeSet<AssetId>), ValidationError> {
    let mut declared: BTreeMap<(AssetId, u16), u64> = BTreeMap::new();
    for effect in &delta.effects {
        for (vin, amount) in &effect.local_inputs {
            declared.insert((effect.asset_id, *vin), *amount);
        }
    }

    let mut burned = Vec::new();
    let mut touched = BTreeSet::new();
    for (vin, outpoint) in tx.inputs.iter().enumerate() {
        for record in state.spend(outpoint) {
            let used = u16::try_from(vin)
                .ok()
                .and_then(|vin| declared.get(&(record.asset_id, vin)))
                .copied()
                .unwrap_or(0);
            touched.insert(record.asset_id);
            burned.push(AssetRecord {
                asset_id: record.asset_id,
                amount: record.amount.saturating_sub(used),
            });
        }
    }

    let origin = match tx.origin {
        TxOrigin::OnChain { .. } => TeleportOrigin::OnChain { height },
        TxOrigin::ArkadeNative { .. } => TeleportOrigin::ArkadeNative,
    };
    let priority = tx.claim_priority(height);

    for effect in &delta.effects {
        let gi = effect.group;

        match &effect.definition {
            DefinitionChange::None => {}
            DefinitionChange::Create(definition) => state.insert_definition(definition.clone()),
            DefinitionChange::UpdateMetadata {
                metadata,
                metadata_hash,
            } => {
                if !state.update_metadata(&effect.asset_id, metadata.clone(), *metadata_hash) {
                    return Err(ValidationError::UnknownAsset {
                        group: gi,
                        asset: effect.asset_id,
                    });
                }
            }
        }

        for (vout, amount) in &effect.credits {
            state.credit(tx.outpoint(*vout as u32), effect.asset_id, *amount)?;
        }

        for commitment in &effect.teleports_claimed {
            state
                .teleports_mut()
                .claim(commitment, priority, tx.txid)
                .map_err(|source| ValidationError::UnknownOrAlreadyClaimedTeleport {
                    group: gi,
                    source,
                })?;
        }

        for (commitment, amount) in &effect.teleports_created {
            state
                .teleports_mut()
                .create(*commitment, effect.asset_id, *amount, origin, tx.txid)
                .map_err(|e| match e {
                    TeleportError::DuplicateCommitment(commitment) => {
                        ValidationError::DuplicateTeleportCommitment { group: gi, commitment }
                    }
                    source => {
                        ValidationError::UnknownOrAlreadyClaimedTeleport { group: gi, source }
                    }
                })?;
        }
    }

    let burned = merge_records(burned);
    if !burned.is_empty() {
        debug!("Tx {}: {} assets partly burned with spent inputs", tx.txid, burned.len());
    }
    Ok((burned, touched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tx, txid};
    use arkade_transaction::TxClass;

    fn record(asset_id: AssetId, amount: u64) -> AssetRecord {
        AssetRecord { asset_id, amount }
    }

    fn asset() -> AssetId {
        AssetId::new(txid(1), 0)
    }

    /// Two UTXOs each holding the largest representable balance
    fn full_state() -> AssetState {
        let mut state = AssetState::new();
        state.credit(OutPoint::new(txid(2), 0), asset(), u64::MAX).unwrap();
        state.credit(OutPoint::new(txid(2), 1), asset(), u64::MAX).unwrap();
        state
    }

    fn spend_both() -> TransactionView {
        tx(9, vec![OutPoint::new(txid(2), 0), OutPoint::new(txid(2), 1)], 1, None, 0)
    }

    #[test]
    fn test_merge_records() {
        let other = AssetId::new(txid(1), 1);
        let records = vec![
            record(other, 4),
            record(asset(), u64::MAX - 1),
            record(asset(), 1),
            record(asset(), 7),
            record(other, 0),
        ];
        assert_eq!(
            merge_records(records),
            vec![
                record(asset(), u64::MAX),
                record(asset(), 7),
                record(other, 4),
            ]
        );
    }

    #[test]
    fn test_implicit_burn_reports_every_unit() {
        let validator = GroupValidator::default();
        let mut state = full_state();

        let outcome = TransactionApplier::new(&validator)
            .apply(&mut state, &spend_both(), 3)
            .unwrap();
        let burned: u128 = outcome.burned.iter().map(|record| record.amount as u128).sum();
        assert_eq!(burned, 2 * u64::MAX as u128);
        assert_eq!(state.total_supply(&asset()), 0);
    }

    #[test]
    fn test_defense_carry_overflow_is_rejected() {
        let validator = GroupValidator::default();
        let mut state = full_state();
        let defense = spend_both().with_class(TxClass::DefenseExempt);

        assert_eq!(
            TransactionApplier::new(&validator).apply(&mut state, &defense, 3),
            Err(ValidationError::BalanceOverflow {
                outpoint: defense.outpoint(0),
                asset: asset()
            })
        );
    }
}
