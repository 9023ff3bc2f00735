//! Block processing: the single writer of the asset state

use crate::transition::{TransactionApplier, TxOutcome};
use crate::validator::GroupValidator;
use arkade_core::config::ValidatorConfig;
use arkade_core::error::{StorageError, ValidationError};
use arkade_core::id::{AssetId, OutPoint, Txid};
use arkade_core::state::{AssetDefinition, AssetRecord};
use arkade_scheduler::{check_claim_order, BasicConflictChecker, ConflictChecker, ConflictResult};
use arkade_storage_impl::{BlockSnapshot, SnapshotStore, GENESIS_HEIGHT};
use arkade_transaction::TransactionView;
use log::{info, warn};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that reject a block or a rollback
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Block height {got} does not follow current height {current}")]
    NonSequentialHeight { current: i64, got: i64 },

    #[error("Outpoint {outpoint} spent by transaction {first} and again by transaction {second}")]
    ConflictingSpend {
        outpoint: OutPoint,
        first: usize,
        second: usize,
    },

    #[error("Transaction {index} ({txid}) is out of claim-priority order")]
    OutOfOrderTransaction { index: usize, txid: Txid },

    #[error("Transaction {index} ({txid}) is invalid: {source}")]
    InvalidTransaction {
        index: usize,
        txid: Txid,
        source: ValidationError,
    },

    #[error("Cannot roll back below genesis")]
    RollbackBelowGenesis,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of a committed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReceipt {
    pub height: i64,
    pub state_root: [u8; 32],
    /// One entry per transaction, in block order
    pub outcomes: Vec<TxOutcome>,
}

type SharedSnapshot = Arc<RwLock<Arc<BlockSnapshot>>>;

fn load(shared: &SharedSnapshot) -> Arc<BlockSnapshot> {
    match shared.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Read handle on the committed state
///
/// Readers never observe a block that is still being applied.
#[derive(Debug, Clone)]
pub struct StateReader {
    committed: SharedSnapshot,
}

impl StateReader {
    /// The latest committed snapshot
    pub fn snapshot(&self) -> Arc<BlockSnapshot> {
        load(&self.committed)
    }

    pub fn height(&self) -> i64 {
        self.snapshot().height
    }

    pub fn state_root(&self) -> [u8; 32] {
        self.snapshot().state_root
    }

    pub fn records(&self, outpoint: &OutPoint) -> Vec<AssetRecord> {
        self.snapshot().state.records(outpoint)
    }

    pub fn balance(&self, outpoint: &OutPoint, asset_id: &AssetId) -> u64 {
        self.snapshot().state.balance(outpoint, asset_id)
    }

    pub fn definition(&self, asset_id: &AssetId) -> Option<AssetDefinition> {
        self.snapshot().state.definition(asset_id).cloned()
    }

    pub fn total_supply(&self, asset_id: &AssetId) -> u128 {
        self.snapshot().state.total_supply(asset_id)
    }
}

/// Applies blocks atomically and persists one snapshot per block
pub struct BlockProcessor<S: SnapshotStore> {
    store: S,
    validator: GroupValidator,
    conflict_checker: BasicConflictChecker,
    committed: SharedSnapshot,
}

impl<S: SnapshotStore> BlockProcessor<S> {
    /// Open a processor on `store`, resuming from its latest snapshot
    ///
    /// # Parameters
    /// * `store` - Snapshot log to resume from and append to
    /// * `config` - Validation settings
    ///
    /// # Returns
    /// A processor at the latest stored height, or at genesis for an empty store
    pub fn open(store: S, config: ValidatorConfig) -> Result<Self, BlockError> {
        let snapshot = match store.latest()? {
            Some(snapshot) => {
                if !snapshot.verify_root()? {
                    warn!("Snapshot at height {} does not match its state root", snapshot.height);
                    return Err(StorageError::Corrupted(format!(
                        "State root mismatch at height {}",
                        snapshot.height
                    ))
                    .into());
                }
                info!("Resuming from snapshot at height {}", snapshot.height);
                snapshot
            }
            None => BlockSnapshot::genesis()?,
        };

        Ok(Self {
            store,
            validator: GroupValidator::new(config),
            conflict_checker: BasicConflictChecker::new(),
            committed: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    /// Height of the last committed block, `-1` before the first one
    pub fn height(&self) -> i64 {
        load(&self.committed).height
    }

    /// The latest committed snapshot
    pub fn snapshot(&self) -> Arc<BlockSnapshot> {
        load(&self.committed)
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            committed: Arc::clone(&self.committed),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        self.validator.config()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply every transaction of the block at `height`, all or nothing
    ///
    /// # Parameters
    /// * `height` - Height of the block; must follow the current height
    /// * `transactions` - The block's transactions in claim-priority order
    ///
    /// # Returns
    /// A receipt for the committed block, or the reason it was rejected.
    /// A rejected block leaves the committed state and height unchanged.
    pub fn apply_block(
        &mut self,
        height: i64,
        transactions: &[TransactionView],
    ) -> Result<BlockReceipt, BlockError> {
        let current = self.snapshot();
        let follows = if current.height == GENESIS_HEIGHT {
            height >= 0
        } else {
            current.height.checked_add(1) == Some(height)
        };
        if !follows {
            warn!("Rejecting block {}: current height is {}", height, current.height);
            return Err(BlockError::NonSequentialHeight {
                current: current.height,
                got: height,
            });
        }

        if let ConflictResult::Conflict {
            outpoint,
            first,
            second,
        } = self.conflict_checker.check_conflicts(transactions)
        {
            warn!("Rejecting block {}: {} spent twice", height, outpoint);
            return Err(BlockError::ConflictingSpend {
                outpoint,
                first,
                second,
            });
        }

        if let Err(violation) = check_claim_order(transactions, height) {
            let txid = transactions[violation.index].txid;
            warn!("Rejecting block {}: transaction {} out of order", height, txid);
            return Err(BlockError::OutOfOrderTransaction {
                index: violation.index,
                txid,
            });
        }

        let applier = TransactionApplier::new(&self.validator);
        let mut scratch = current.state.clone();
        let mut outcomes = Vec::with_capacity(transactions.len());
        for (index, tx) in transactions.iter().enumerate() {
            let outcome = applier.apply(&mut scratch, tx, height).map_err(|source| {
                warn!(
                    "Rejecting block {}: transaction {} ({}) invalid: {}",
                    height, index, tx.txid, source
                );
                BlockError::InvalidTransaction {
                    index,
                    txid: tx.txid,
                    source,
                }
            })?;
            outcomes.push(outcome);
        }

        let snapshot = BlockSnapshot::new(height, scratch)?;
        self.store.put(&snapshot)?;
        let state_root = snapshot.state_root;
        self.publish(snapshot);

        info!(
            "Committed block {} with {} transactions, state root {}",
            height,
            transactions.len(),
            hex::encode(state_root)
        );

        Ok(BlockReceipt {
            height,
            state_root,
            outcomes,
        })
    }

    /// Undo the last committed block
    ///
    /// # Returns
    /// The height after the rollback
    pub fn rollback_last_block(&mut self) -> Result<i64, BlockError> {
        let current = self.height();
        if current == GENESIS_HEIGHT {
            return Err(BlockError::RollbackBelowGenesis);
        }

        self.store.remove(current)?;
        let previous = match self.store.latest()? {
            Some(snapshot) => snapshot,
            None => BlockSnapshot::genesis()?,
        };
        let height = previous.height;
        self.publish(previous);

        info!("Rolled back block {}, now at height {}", current, height);
        Ok(height)
    }

    fn publish(&self, snapshot: BlockSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.committed.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
