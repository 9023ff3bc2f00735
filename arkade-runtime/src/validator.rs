//! Per-group validation of a resolved asset packet
//!
//! Validation is pure: it reads the pre-transaction state and produces a
//! [`StateDelta`] without touching anything. The delta is applied by
//! [`crate::transition`].

use crate::resolver::ResolvedPacket;
use arkade_core::config::ValidatorConfig;
use arkade_core::error::{ResolveError, TeleportError, ValidationError};
use arkade_core::id::{AssetId, Txid};
use arkade_core::packet::{AssetInput, AssetOutput, Commitment, Group, Metadata};
use arkade_core::state::{AssetDefinition, AssetState};
use arkade_proofs::{teleport_commitment, MetadataHasher};
use arkade_transaction::TransactionView;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Change a group makes to its asset's definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionChange {
    /// Definition untouched (transfers, burns, idempotent metadata updates)
    None,
    /// Fresh asset minted by this group
    Create(AssetDefinition),
    /// Metadata replaced on an existing asset
    UpdateMetadata {
        metadata: Metadata,
        metadata_hash: [u8; 32],
    },
}

/// Everything one validated group does to the state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEffect {
    pub group: u16,
    pub asset_id: AssetId,
    pub sum_in: u64,
    pub sum_out: u64,

    /// Control asset in force after this group
    pub control_asset: Option<AssetId>,

    /// Metadata hash in force after this group
    pub metadata_hash: [u8; 32],

    pub definition: DefinitionChange,

    /// `(vin, amount)` taken from spent UTXOs
    pub local_inputs: Vec<(u16, u64)>,

    /// `(vout, amount)` records created on this transaction's outputs
    pub credits: Vec<(u16, u64)>,

    pub teleports_created: Vec<(Commitment, u64)>,
    pub teleports_claimed: Vec<Commitment>,
}

impl GroupEffect {
    /// Signed supply change of the group
    pub fn delta(&self) -> i128 {
        self.sum_out as i128 - self.sum_in as i128
    }
}

/// Validated effects of a whole packet, in group order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub txid: Txid,
    pub effects: Vec<GroupEffect>,
}

/// Read-only inputs of a validation run
pub struct ValidationContext<'a> {
    pub resolved: &'a ResolvedPacket<'a>,
    pub tx: &'a TransactionView,
    /// State before the transaction, including the teleport ledger
    pub state: &'a AssetState,
    /// Height of the block containing the transaction
    pub height: i64,
}

/// Checks every protocol rule for the groups of a packet
#[derive(Debug, Clone, Default)]
pub struct GroupValidator {
    config: ValidatorConfig,
    hasher: MetadataHasher,
}

impl GroupValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            hasher: MetadataHasher::new(),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate the whole packet: packet-wide checks, then each group in order
    ///
    /// # Parameters
    /// * `ctx` - The resolved packet, its transaction and the pre-transaction state
    ///
    /// # Returns
    /// The delta to apply, or the first rule violated
    pub fn validate_packet(
        &self,
        ctx: &ValidationContext<'_>,
    ) -> Result<StateDelta, ValidationError> {
        self.check_unique_assets(ctx)?;
        self.check_teleport_uniqueness(ctx)?;

        let mut effects = Vec::with_capacity(ctx.resolved.group_count());
        for index in 0..ctx.resolved.group_count() {
            effects.push(self.validate_group(ctx, index)?);
        }

        Ok(StateDelta {
            txid: ctx.tx.txid,
            effects,
        })
    }

    /// Validate group `index` against the pre-transaction state
    pub fn validate_group(
        &self,
        ctx: &ValidationContext<'_>,
        index: usize,
    ) -> Result<GroupEffect, ValidationError> {
        let (group, asset_id) = match (ctx.resolved.group(index), ctx.resolved.group_id(index)) {
            (Some(group), Some(asset_id)) => (group, asset_id),
            _ => {
                return Err(ResolveError::OutOfRangeGroupIndex {
                    group: index as u16,
                    target: index as u16,
                    group_count: ctx.resolved.group_count(),
                }
                .into())
            }
        };
        let gi = index as u16;

        let sum_in = group
            .sum_inputs()
            .ok_or(ValidationError::AmountOverflow { group: gi })?;
        let sum_out = group
            .sum_outputs()
            .ok_or(ValidationError::AmountOverflow { group: gi })?;

        check_nonzero(group, gi)?;
        let (local_inputs, credits) = check_indices(ctx, group, gi, asset_id)?;

        let existing = match group.asset_id {
            Some(_) => Some(self.check_existing(ctx, group, gi, asset_id)?),
            None => None,
        };

        for (vin, amount) in &local_inputs {
            let outpoint = ctx.tx.inputs[*vin as usize];
            let available = ctx.state.balance(&outpoint, &asset_id);
            if *amount > available {
                return Err(ValidationError::InsufficientInputBalance {
                    group: gi,
                    vin: *vin,
                    outpoint,
                    asset: asset_id,
                    available,
                    claimed: *amount,
                });
            }
        }

        let teleports_claimed = self.check_teleport_inputs(ctx, group, gi, asset_id)?;

        let control_asset = match existing {
            Some(definition) => definition.control_asset,
            None => ctx.resolved.control(index),
        };
        if sum_out > sum_in {
            self.check_issuance(ctx, index, existing.is_some(), control_asset, asset_id)?;
        }

        let definition = match existing {
            None => {
                let metadata = group.metadata.clone().unwrap_or_default();
                let metadata_hash = self.hasher.hash(&metadata);
                DefinitionChange::Create(AssetDefinition {
                    asset_id,
                    control_asset,
                    metadata,
                    metadata_hash,
                    immutable: group.immutable,
                    genesis_height: ctx.height,
                })
            }
            Some(definition) => self.check_metadata_update(ctx, group, gi, definition)?,
        };
        let metadata_hash = match (&definition, existing) {
            (DefinitionChange::Create(created), _) => created.metadata_hash,
            (DefinitionChange::UpdateMetadata { metadata_hash, .. }, _) => *metadata_hash,
            (DefinitionChange::None, Some(definition)) => definition.metadata_hash,
            (DefinitionChange::None, None) => self.hasher.hash(&Metadata::new()),
        };

        let teleports_created = group
            .outputs
            .iter()
            .filter_map(|output| match output {
                AssetOutput::Teleport { commitment, amount } => Some((*commitment, *amount)),
                AssetOutput::Local { .. } => None,
            })
            .collect();

        Ok(GroupEffect {
            group: gi,
            asset_id,
            sum_in,
            sum_out,
            control_asset,
            metadata_hash,
            definition,
            local_inputs,
            credits,
            teleports_created,
            teleports_claimed,
        })
    }

    /// Two groups may never operate on the same asset
    fn check_unique_assets(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        let mut seen: BTreeMap<AssetId, u16> = BTreeMap::new();
        for (index, _, asset_id) in ctx.resolved.iter() {
            if let Some(first) = seen.insert(asset_id, index as u16) {
                return Err(ValidationError::DuplicateAssetGroup {
                    first,
                    second: index as u16,
                    asset: asset_id,
                });
            }
        }
        Ok(())
    }

    /// Commitments created must be new, commitments claimed must be claimed once
    fn check_teleport_uniqueness(
        &self,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), ValidationError> {
        let mut created = BTreeSet::new();
        let mut claimed = BTreeSet::new();

        for (index, group, _) in ctx.resolved.iter() {
            let gi = index as u16;
            for output in &group.outputs {
                if let AssetOutput::Teleport { commitment, .. } = output {
                    let known = ctx.state.teleports().get(commitment).is_some();
                    if !created.insert(*commitment) || known {
                        return Err(ValidationError::DuplicateTeleportCommitment {
                            group: gi,
                            commitment: hex::encode(commitment),
                        });
                    }
                }
            }
            for input in &group.inputs {
                if let AssetInput::Teleport { commitment, .. } = input {
                    if !claimed.insert(*commitment) {
                        return Err(ValidationError::UnknownOrAlreadyClaimedTeleport {
                            group: gi,
                            source: TeleportError::AlreadyClaimed {
                                commitment: hex::encode(commitment),
                                claimed_by: ctx.tx.txid,
                            },
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Genesis-only fields and existence of an explicitly named asset
    fn check_existing<'s>(
        &self,
        ctx: &ValidationContext<'s>,
        group: &Group,
        gi: u16,
        asset_id: AssetId,
    ) -> Result<&'s AssetDefinition, ValidationError> {
        if group.control_asset.is_some() {
            return Err(ValidationError::GenesisOnlyField {
                group: gi,
                field: "control_asset",
            });
        }
        if group.immutable {
            return Err(ValidationError::GenesisOnlyField {
                group: gi,
                field: "immutable",
            });
        }
        ctx.state
            .definition(&asset_id)
            .ok_or(ValidationError::UnknownAsset {
                group: gi,
                asset: asset_id,
            })
    }

    fn check_teleport_inputs(
        &self,
        ctx: &ValidationContext<'_>,
        group: &Group,
        gi: u16,
        asset_id: AssetId,
    ) -> Result<Vec<Commitment>, ValidationError> {
        let mut claimed = Vec::new();

        for input in &group.inputs {
            let AssetInput::Teleport {
                commitment,
                nonce,
                amount,
            } = input
            else {
                continue;
            };
            let encoded = hex::encode(commitment);

            let entry = ctx
                .state
                .teleports()
                .check_claim(commitment)
                .map_err(|source| ValidationError::UnknownOrAlreadyClaimedTeleport {
                    group: gi,
                    source,
                })?;

            if entry.asset_id != asset_id {
                return Err(ValidationError::TeleportAssetMismatch {
                    group: gi,
                    commitment: encoded,
                    expected: entry.asset_id,
                    claimed: asset_id,
                });
            }
            if entry.amount != *amount {
                return Err(ValidationError::TeleportAmountMismatch {
                    group: gi,
                    commitment: encoded,
                    expected: entry.amount,
                    claimed: *amount,
                });
            }

            let delivered = group.outputs.iter().any(|output| match output {
                AssetOutput::Local { vout, .. } => ctx
                    .tx
                    .outputs
                    .get(*vout as usize)
                    .map(|out| teleport_commitment(nonce, &out.script_pubkey) == *commitment)
                    .unwrap_or(false),
                AssetOutput::Teleport { .. } => false,
            });
            if !delivered {
                return Err(ValidationError::TeleportDestinationMismatch {
                    group: gi,
                    commitment: encoded,
                });
            }

            if let Some(confirmations) = entry.confirmations(ctx.height) {
                if confirmations < self.config.min_confirmations as u64 {
                    return Err(ValidationError::TeleportNotConfirmed {
                        group: gi,
                        commitment: encoded,
                        confirmations,
                        required: self.config.min_confirmations,
                    });
                }
            }

            claimed.push(*commitment);
        }

        Ok(claimed)
    }

    /// A supply increase needs the control asset present in the packet, in a
    /// group that keeps at least one unit of it alive. An existing control
    /// asset must also be spent: its group consumes at least one unit, and
    /// those inputs are checked against the state when that group validates.
    fn check_issuance(
        &self,
        ctx: &ValidationContext<'_>,
        index: usize,
        existing: bool,
        control_asset: Option<AssetId>,
        asset_id: AssetId,
    ) -> Result<(), ValidationError> {
        let gi = index as u16;
        let control = match control_asset {
            Some(control) => control,
            // Fresh assets without a control asset mint freely; existing ones
            // without one have a final supply
            None if !existing => return Ok(()),
            None => {
                return Err(ValidationError::MissingControlAssetForIssuance {
                    group: gi,
                    asset: asset_id,
                })
            }
        };

        let control_index = ctx
            .resolved
            .index_of(&control)
            .filter(|control_index| *control_index != index)
            .ok_or(ValidationError::MissingControlAssetForIssuance {
                group: gi,
                asset: asset_id,
            })?;

        let Some(control_group) = ctx.resolved.group(control_index) else {
            return Err(ValidationError::MissingControlAssetForIssuance {
                group: gi,
                asset: asset_id,
            });
        };

        // A control minted by this same packet has nothing to spend yet
        let fresh_control = control_group.asset_id.is_none();
        if !fresh_control && control_group.sum_inputs().unwrap_or(0) == 0 {
            return Err(ValidationError::ControlAssetNotSpent { group: gi, control });
        }

        if control_group.sum_outputs().unwrap_or(0) == 0 {
            return Err(ValidationError::ControlAssetNotRetained { group: gi, control });
        }
        Ok(())
    }

    fn check_metadata_update(
        &self,
        ctx: &ValidationContext<'_>,
        group: &Group,
        gi: u16,
        definition: &AssetDefinition,
    ) -> Result<DefinitionChange, ValidationError> {
        let Some(metadata) = &group.metadata else {
            return Ok(DefinitionChange::None);
        };

        if definition.immutable {
            return Err(ValidationError::ImmutableMetadata {
                group: gi,
                asset: definition.asset_id,
            });
        }

        let authorized = definition.control_asset.is_some_and(|control| {
            ctx.tx
                .inputs
                .iter()
                .any(|outpoint| ctx.state.balance(outpoint, &control) > 0)
        });
        if !authorized {
            return Err(ValidationError::UnauthorizedMetadataUpdate {
                group: gi,
                asset: definition.asset_id,
            });
        }

        if *metadata == definition.metadata {
            return Ok(DefinitionChange::None);
        }
        Ok(DefinitionChange::UpdateMetadata {
            metadata: metadata.clone(),
            metadata_hash: self.hasher.hash(metadata),
        })
    }
}

fn check_nonzero(group: &Group, gi: u16) -> Result<(), ValidationError> {
    if group.inputs.iter().any(|input| input.amount() == 0) {
        return Err(ValidationError::ZeroAmount {
            group: gi,
            field: "input",
        });
    }
    if group.outputs.iter().any(|output| output.amount() == 0) {
        return Err(ValidationError::ZeroAmount {
            group: gi,
            field: "output",
        });
    }
    Ok(())
}

/// Bounds and uniqueness of local indices. Returns the local inputs and
/// outputs of the group.
#[allow(clippy::type_complexity)]
fn check_indices(
    ctx: &ValidationContext<'_>,
    group: &Group,
    gi: u16,
    asset_id: AssetId,
) -> Result<(Vec<(u16, u64)>, Vec<(u16, u64)>), ValidationError> {
    let mut inputs = Vec::new();
    let mut seen_vins = BTreeSet::new();
    for input in &group.inputs {
        if let AssetInput::Local { vin, amount } = input {
            if *vin as usize >= ctx.tx.inputs.len() {
                return Err(ValidationError::InputIndexOutOfBounds {
                    group: gi,
                    vin: *vin,
                    count: ctx.tx.inputs.len(),
                });
            }
            if !seen_vins.insert(*vin) {
                return Err(ValidationError::DuplicateInput {
                    group: gi,
                    vin: *vin,
                    asset: asset_id,
                });
            }
            inputs.push((*vin, *amount));
        }
    }

    let mut outputs = Vec::new();
    let mut seen_vouts = BTreeSet::new();
    for output in &group.outputs {
        if let AssetOutput::Local { vout, amount } = output {
            if *vout as usize >= ctx.tx.outputs.len() {
                return Err(ValidationError::OutputIndexOutOfBounds {
                    group: gi,
                    vout: *vout,
                    count: ctx.tx.outputs.len(),
                });
            }
            if !seen_vouts.insert(*vout) {
                return Err(ValidationError::DuplicateOutput {
                    group: gi,
                    vout: *vout,
                });
            }
            outputs.push((*vout, *amount));
        }
    }

    Ok((inputs, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ReferenceResolver;
    use crate::test_utils::{existing, local_in, local_out, metadata, mint, script, tx, txid};
    use arkade_core::id::OutPoint;
    use arkade_core::packet::{AssetRef, Packet};
    use arkade_core::teleport::TeleportOrigin;
    use arkade_proofs::EMPTY_METADATA_HASH;
    use arkade_transaction::TxOut;

    fn asset_a() -> AssetId {
        AssetId::new(txid(1), 0)
    }

    fn control_c() -> AssetId {
        AssetId::new(txid(1), 1)
    }

    fn asset_b() -> AssetId {
        AssetId::new(txid(3), 0)
    }

    fn op_a() -> OutPoint {
        OutPoint::new(txid(2), 0)
    }

    fn op_c() -> OutPoint {
        OutPoint::new(txid(2), 1)
    }

    fn op_b() -> OutPoint {
        OutPoint::new(txid(2), 2)
    }

    fn definition(asset_id: AssetId, control_asset: Option<AssetId>) -> AssetDefinition {
        AssetDefinition {
            asset_id,
            control_asset,
            metadata: Metadata::new(),
            metadata_hash: EMPTY_METADATA_HASH,
            immutable: false,
            genesis_height: 0,
        }
    }

    /// A (controlled by C) on op_a, C on op_c, B (no control) on op_b
    fn base_state() -> AssetState {
        let mut state = AssetState::new();
        state.insert_definition(definition(asset_a(), Some(control_c())));
        state.insert_definition(definition(control_c(), None));
        state.insert_definition(definition(asset_b(), None));
        state.credit(op_a(), asset_a(), 100).unwrap();
        state.credit(op_c(), control_c(), 1).unwrap();
        state.credit(op_b(), asset_b(), 10).unwrap();
        state
    }

    fn validate(
        state: &AssetState,
        tx: &TransactionView,
        packet: &Packet,
        height: i64,
    ) -> Result<StateDelta, ValidationError> {
        let resolved = ReferenceResolver::new().resolve(packet, tx.txid)?;
        let ctx = ValidationContext {
            resolved: &resolved,
            tx,
            state,
            height,
        };
        GroupValidator::default().validate_packet(&ctx)
    }

    #[test]
    fn test_transfer() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 100)],
            vec![local_out(0, 60), local_out(1, 40)],
        )]);
        let tx = tx(9, vec![op_a()], 2, Some(&packet), 0);

        let delta = validate(&state, &tx, &packet, 5).unwrap();
        let effect = &delta.effects[0];
        assert_eq!(effect.sum_in, 100);
        assert_eq!(effect.sum_out, 100);
        assert_eq!(effect.delta(), 0);
        assert_eq!(effect.credits, vec![(0, 60), (1, 40)]);
        assert_eq!(effect.definition, DefinitionChange::None);
        assert_eq!(effect.control_asset, Some(control_c()));
    }

    #[test]
    fn test_zero_amount() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 100)],
            vec![local_out(0, 100), local_out(1, 0)],
        )]);
        let tx = tx(9, vec![op_a()], 2, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::ZeroAmount {
                group: 0,
                field: "output"
            })
        );
    }

    #[test]
    fn test_amount_overflow() {
        let state = base_state();
        let mut packet = Packet::new(vec![mint(0, u64::MAX, None)]);
        packet.groups[0].outputs.push(local_out(1, 1));
        let tx = tx(9, vec![], 2, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::AmountOverflow { group: 0 })
        );
    }

    #[test]
    fn test_index_bounds() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(1, 10)],
            vec![local_out(0, 10)],
        )]);
        let tx1 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx1, &packet, 5),
            Err(ValidationError::InputIndexOutOfBounds {
                group: 0,
                vin: 1,
                count: 1
            })
        );

        // vout 2 is the carrier itself; vout 3 does not exist
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 10)],
            vec![local_out(3, 10)],
        )]);
        let tx2 = tx(9, vec![op_a()], 2, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx2, &packet, 5),
            Err(ValidationError::OutputIndexOutOfBounds {
                group: 0,
                vout: 3,
                count: 3
            })
        );
    }

    #[test]
    fn test_duplicate_indices() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 10), local_in(0, 10)],
            vec![local_out(0, 20)],
        )]);
        let tx1 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx1, &packet, 5),
            Err(ValidationError::DuplicateInput {
                group: 0,
                vin: 0,
                asset: asset_a()
            })
        );

        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 20)],
            vec![local_out(0, 10), local_out(0, 10)],
        )]);
        let tx2 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx2, &packet, 5),
            Err(ValidationError::DuplicateOutput { group: 0, vout: 0 })
        );
    }

    #[test]
    fn test_duplicate_asset_group() {
        let state = base_state();
        let packet = Packet::new(vec![
            existing(asset_a(), vec![local_in(0, 50)], vec![local_out(0, 50)]),
            existing(asset_a(), vec![], vec![]),
        ]);
        let tx = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::DuplicateAssetGroup {
                first: 0,
                second: 1,
                asset: asset_a()
            })
        );
    }

    #[test]
    fn test_insufficient_input_balance() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 101)],
            vec![local_out(0, 101)],
        )]);
        let tx = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::InsufficientInputBalance {
                group: 0,
                vin: 0,
                outpoint: op_a(),
                asset: asset_a(),
                available: 100,
                claimed: 101
            })
        );
    }

    #[test]
    fn test_partial_input_declaration_burns() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 70)],
            vec![local_out(0, 60)],
        )]);
        let tx = tx(9, vec![op_a()], 1, Some(&packet), 0);
        let delta = validate(&state, &tx, &packet, 5).unwrap();
        assert_eq!(delta.effects[0].delta(), -10);
    }

    #[test]
    fn test_unknown_asset_and_genesis_only_fields() {
        let state = base_state();
        let unknown = AssetId::new(txid(42), 0);
        let packet = Packet::new(vec![existing(unknown, vec![], vec![])]);
        let tx1 = tx(9, vec![], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx1, &packet, 5),
            Err(ValidationError::UnknownAsset {
                group: 0,
                asset: unknown
            })
        );

        let mut group = existing(asset_a(), vec![local_in(0, 100)], vec![local_out(0, 100)]);
        group.immutable = true;
        let packet = Packet::new(vec![group]);
        let tx2 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx2, &packet, 5),
            Err(ValidationError::GenesisOnlyField {
                group: 0,
                field: "immutable"
            })
        );

        let mut group = existing(asset_a(), vec![local_in(0, 100)], vec![local_out(0, 100)]);
        group.control_asset = Some(AssetRef::ById(asset_b()));
        let packet = Packet::new(vec![group]);
        let tx3 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx3, &packet, 5),
            Err(ValidationError::GenesisOnlyField {
                group: 0,
                field: "control_asset"
            })
        );
    }

    #[test]
    fn test_reissuance_requires_control_group() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_a(),
            vec![local_in(0, 100)],
            vec![local_out(0, 150)],
        )]);
        let tx1 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx1, &packet, 5),
            Err(ValidationError::MissingControlAssetForIssuance {
                group: 0,
                asset: asset_a()
            })
        );

        let packet = Packet::new(vec![
            existing(asset_a(), vec![local_in(0, 100)], vec![local_out(0, 150)]),
            existing(control_c(), vec![local_in(1, 1)], vec![local_out(1, 1)]),
        ]);
        let tx2 = tx(9, vec![op_a(), op_c()], 2, Some(&packet), 0);
        let delta = validate(&state, &tx2, &packet, 5).unwrap();
        assert_eq!(delta.effects[0].delta(), 50);
    }

    #[test]
    fn test_control_asset_must_be_retained() {
        let state = base_state();
        let packet = Packet::new(vec![
            existing(asset_a(), vec![local_in(0, 100)], vec![local_out(0, 150)]),
            existing(control_c(), vec![local_in(1, 1)], vec![]),
        ]);
        let tx = tx(9, vec![op_a(), op_c()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::ControlAssetNotRetained {
                group: 0,
                control: control_c()
            })
        );
    }

    #[test]
    fn test_control_asset_must_be_spent() {
        let state = base_state();
        let packet = Packet::new(vec![
            existing(asset_a(), vec![local_in(0, 100)], vec![local_out(0, 150)]),
            existing(control_c(), vec![], vec![local_out(1, 1)]),
        ]);
        let tx = tx(9, vec![op_a()], 2, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::ControlAssetNotSpent {
                group: 0,
                control: control_c()
            })
        );
    }

    #[test]
    fn test_mutual_controls_cannot_mint_from_nothing() {
        // X and Y were minted as each other's control asset
        let x = AssetId::new(txid(3), 0);
        let y = AssetId::new(txid(3), 1);
        let mut state = AssetState::new();
        state.insert_definition(definition(x, Some(y)));
        state.insert_definition(definition(y, Some(x)));
        state.credit(OutPoint::new(txid(3), 0), x, 100).unwrap();
        state.credit(OutPoint::new(txid(3), 1), y, 1).unwrap();

        let packet = Packet::new(vec![
            existing(x, vec![], vec![local_out(0, 1_000_000)]),
            existing(y, vec![], vec![local_out(1, 1)]),
        ]);
        let tx = tx(9, vec![], 2, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::ControlAssetNotSpent { group: 0, control: y })
        );
    }

    #[test]
    fn test_uncontrolled_asset_is_never_reissued() {
        let state = base_state();
        let packet = Packet::new(vec![existing(
            asset_b(),
            vec![local_in(0, 10)],
            vec![local_out(0, 11)],
        )]);
        let tx = tx(9, vec![op_b()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::MissingControlAssetForIssuance {
                group: 0,
                asset: asset_b()
            })
        );
    }

    #[test]
    fn test_fresh_genesis() {
        let state = base_state();
        let mut token = mint(0, 1000, Some(AssetRef::ByGroup(1)));
        token.metadata = Some(metadata(&[("name", "Gold")]));
        let packet = Packet::new(vec![token, mint(1, 1, None)]);
        let tx = tx(9, vec![], 2, Some(&packet), 0);

        let delta = validate(&state, &tx, &packet, 5).unwrap();
        let DefinitionChange::Create(created) = &delta.effects[0].definition else {
            panic!("expected a new definition");
        };
        assert_eq!(created.asset_id, AssetId::new(txid(9), 0));
        assert_eq!(created.control_asset, Some(AssetId::new(txid(9), 1)));
        assert_eq!(created.genesis_height, 5);
        let expected_hash = MetadataHasher::new().hash(&metadata(&[("name", "Gold")]));
        assert_eq!(created.metadata_hash, expected_hash);
        assert_eq!(delta.effects[0].metadata_hash, created.metadata_hash);
    }

    #[test]
    fn test_fresh_with_absent_control() {
        let state = base_state();
        let packet = Packet::new(vec![mint(0, 1000, Some(AssetRef::ById(control_c())))]);
        let tx = tx(9, vec![], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx, &packet, 5),
            Err(ValidationError::MissingControlAssetForIssuance {
                group: 0,
                asset: AssetId::new(txid(9), 0)
            })
        );
    }

    #[test]
    fn test_metadata_updates() {
        let mut state = base_state();
        let update = |asset: AssetId, vin: u16| {
            let mut group = existing(asset, vec![local_in(vin, 100)], vec![local_out(0, 100)]);
            group.metadata = Some(metadata(&[("name", "Gold v2")]));
            group
        };

        // Not spending the control asset
        let packet = Packet::new(vec![update(asset_a(), 0)]);
        let tx1 = tx(9, vec![op_a()], 1, Some(&packet), 0);
        assert_eq!(
            validate(&state, &tx1, &packet, 5),
            Err(ValidationError::UnauthorizedMetadataUpdate {
                group: 0,
                asset: asset_a()
            })
        );

        // Spending op_c, which holds C
        let tx2 = tx(9, vec![op_a(), op_c()], 1, Some(&packet), 0);
        let delta = validate(&state, &tx2, &packet, 5).unwrap();
        let expected_hash = MetadataHasher::new().hash(&metadata(&[("name", "Gold v2")]));
        assert_eq!(
            delta.effects[0].definition,
            DefinitionChange::UpdateMetadata {
                metadata: metadata(&[("name", "Gold v2")]),
                metadata_hash: expected_hash,
            }
        );

        // Same map again changes nothing
        state.update_metadata(&asset_a(), metadata(&[("name", "Gold v2")]), expected_hash);
        let delta = validate(&state, &tx2, &packet, 5).unwrap();
        assert_eq!(delta.effects[0].definition, DefinitionChange::None);
        assert_eq!(delta.effects[0].metadata_hash, expected_hash);

        // Frozen metadata
        let mut frozen = definition(asset_a(), Some(control_c()));
        frozen.immutable = true;
        state.insert_definition(frozen);
        assert_eq!(
            validate(&state, &tx2, &packet, 5),
            Err(ValidationError::ImmutableMetadata {
                group: 0,
                asset: asset_a()
            })
        );
    }

    mod teleports {
        use super::*;

        const NONCE: [u8; 32] = [7; 32];

        fn destination() -> Vec<u8> {
            script(0xaa)
        }

        fn commitment() -> Commitment {
            teleport_commitment(&NONCE, &destination())
        }

        /// Base state plus 50 A teleported from a transaction at height 10
        fn state() -> AssetState {
            let mut state = base_state();
            state
                .teleports_mut()
                .create(
                    commitment(),
                    asset_a(),
                    50,
                    TeleportOrigin::OnChain { height: 10 },
                    txid(4),
                )
                .unwrap();
            state
        }

        fn claim(asset: AssetId, nonce: [u8; 32], amount: u64) -> (TransactionView, Packet) {
            let packet = Packet::new(vec![existing(
                asset,
                vec![AssetInput::Teleport {
                    commitment: commitment(),
                    nonce,
                    amount,
                }],
                vec![local_out(0, amount)],
            )]);
            let mut tx = tx(9, vec![], 0, Some(&packet), 0);
            tx.outputs.insert(0, TxOut::new(destination(), 1000));
            (tx, packet)
        }

        #[test]
        fn test_valid_claim() {
            let (tx, packet) = claim(asset_a(), NONCE, 50);
            let delta = validate(&state(), &tx, &packet, 15).unwrap();
            assert_eq!(delta.effects[0].teleports_claimed, vec![commitment()]);
            assert_eq!(delta.effects[0].delta(), 0);
        }

        #[test]
        fn test_claim_needs_confirmations() {
            let (tx, packet) = claim(asset_a(), NONCE, 50);
            assert_eq!(
                validate(&state(), &tx, &packet, 14),
                Err(ValidationError::TeleportNotConfirmed {
                    group: 0,
                    commitment: hex::encode(commitment()),
                    confirmations: 5,
                    required: 6
                })
            );
        }

        #[test]
        fn test_claim_mismatches() {
            let (tx, packet) = claim(asset_a(), NONCE, 40);
            assert!(matches!(
                validate(&state(), &tx, &packet, 15),
                Err(ValidationError::TeleportAmountMismatch {
                    expected: 50,
                    claimed: 40,
                    ..
                })
            ));

            let (tx, packet) = claim(asset_b(), NONCE, 50);
            assert!(matches!(
                validate(&state(), &tx, &packet, 15),
                Err(ValidationError::TeleportAssetMismatch { .. })
            ));

            let (tx, packet) = claim(asset_a(), [8; 32], 50);
            assert!(matches!(
                validate(&state(), &tx, &packet, 15),
                Err(ValidationError::TeleportDestinationMismatch { .. })
            ));
        }

        #[test]
        fn test_unknown_or_claimed() {
            let (tx, packet) = claim(asset_a(), NONCE, 50);
            assert!(matches!(
                validate(&base_state(), &tx, &packet, 15),
                Err(ValidationError::UnknownOrAlreadyClaimedTeleport {
                    source: TeleportError::Unknown(_),
                    ..
                })
            ));

            let mut claimed = state();
            claimed
                .teleports_mut()
                .claim(&commitment(), tx.claim_priority(12), txid(5))
                .unwrap();
            assert!(matches!(
                validate(&claimed, &tx, &packet, 15),
                Err(ValidationError::UnknownOrAlreadyClaimedTeleport {
                    source: TeleportError::AlreadyClaimed { .. },
                    ..
                })
            ));
        }

        #[test]
        fn test_duplicate_commitment() {
            let packet = Packet::new(vec![existing(
                asset_a(),
                vec![local_in(0, 100)],
                vec![AssetOutput::Teleport {
                    commitment: commitment(),
                    amount: 100,
                }],
            )]);
            let tx = tx(9, vec![op_a()], 0, Some(&packet), 0);
            assert!(matches!(
                validate(&state(), &tx, &packet, 15),
                Err(ValidationError::DuplicateTeleportCommitment { group: 0, .. })
            ));

            // Fresh commitment is accepted
            let delta = validate(&base_state(), &tx, &packet, 15).unwrap();
            assert_eq!(delta.effects[0].teleports_created, vec![(commitment(), 100)]);
        }
    }
}
