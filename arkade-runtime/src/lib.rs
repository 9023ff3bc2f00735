pub mod introspection;
pub mod processor;
pub mod resolver;
pub mod transition;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export the main types for convenience
pub use introspection::{GroupIntrospection, PacketIntrospection};
pub use processor::{BlockError, BlockProcessor, BlockReceipt, StateReader};
pub use resolver::{ReferenceResolver, ResolvedPacket};
pub use transition::{PacketOutcome, TransactionApplier, TxOutcome};
pub use validator::{
    DefinitionChange, GroupEffect, GroupValidator, StateDelta, ValidationContext,
};
