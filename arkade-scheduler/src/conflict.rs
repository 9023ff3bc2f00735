use arkade_core::id::OutPoint;
use arkade_transaction::TransactionView;
use std::collections::HashMap;

/// Result of checking a block for conflicting spends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    /// Every outpoint is spent at most once
    NoConflict,
    /// `outpoint` is spent by transaction `first` and again by `second`
    ///
    /// `first == second` when one transaction lists the outpoint twice.
    Conflict {
        outpoint: OutPoint,
        first: usize,
        second: usize,
    },
}

impl ConflictResult {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConflictResult::Conflict { .. })
    }
}

/// Trait for intra-block conflict checking
pub trait ConflictChecker {
    /// Check that no outpoint is spent twice within a block
    ///
    /// # Parameters
    /// * `transactions` - The block's transactions in application order
    ///
    /// # Returns
    /// The first conflict found, or `NoConflict`
    fn check_conflicts(&self, transactions: &[TransactionView]) -> ConflictResult;

    /// Check if a transaction spends nothing
    ///
    /// # Parameters
    /// * `transaction` - The transaction to check
    ///
    /// # Returns
    /// True if the transaction has no inputs
    fn is_spend_free(&self, transaction: &TransactionView) -> bool {
        transaction.inputs.is_empty()
    }
}

/// Basic implementation of the ConflictChecker trait
pub struct BasicConflictChecker;

impl BasicConflictChecker {
    /// Create a new BasicConflictChecker
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for BasicConflictChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictChecker for BasicConflictChecker {
    fn check_conflicts(&self, transactions: &[TransactionView]) -> ConflictResult {
        let mut spent: HashMap<OutPoint, usize> = HashMap::new();

        for (index, tx) in transactions.iter().enumerate() {
            if self.is_spend_free(tx) {
                continue;
            }

            for outpoint in &tx.inputs {
                if let Some(&first) = spent.get(outpoint) {
                    return ConflictResult::Conflict {
                        outpoint: *outpoint,
                        first,
                        second: index,
                    };
                }
                spent.insert(*outpoint, index);
            }
        }

        ConflictResult::NoConflict
    }
}
