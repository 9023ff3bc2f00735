pub mod conflict;
pub mod ordering;

// Re-export the main types for convenience
pub use conflict::{BasicConflictChecker, ConflictChecker, ConflictResult};
pub use ordering::{check_claim_order, OrderViolation};
