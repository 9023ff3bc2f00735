//! Claim-priority ordering of a block's transactions
//!
//! Teleport claims are resolved first-processed-wins, so a block is only
//! accepted when its transactions already follow [`ClaimPriority`] order.

use arkade_core::teleport::ClaimPriority;
use arkade_transaction::TransactionView;

/// A transaction that does not sort strictly after its predecessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderViolation {
    pub index: usize,
    pub previous: ClaimPriority,
    pub current: ClaimPriority,
}

/// Check that `transactions` are strictly increasing in claim priority at `height`
pub fn check_claim_order(
    transactions: &[TransactionView],
    height: i64,
) -> Result<(), OrderViolation> {
    let priorities: Vec<ClaimPriority> = transactions
        .iter()
        .map(|tx| tx.claim_priority(height))
        .collect();

    for (index, pair) in priorities.windows(2).enumerate() {
        if pair[0] >= pair[1] {
            return Err(OrderViolation {
                index: index + 1,
                previous: pair[0],
                current: pair[1],
            });
        }
    }
    Ok(())
}
