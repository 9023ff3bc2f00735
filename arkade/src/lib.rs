//! Arkade Assets
//!
//! This crate re-exports all the components of the Arkade Assets validator:
//! the packet codec and state types, metadata hashing and commitments,
//! transaction views, block scheduling checks, snapshot stores and the
//! block processor.

pub use arkade_core::*;
pub use arkade_proofs::*;
pub use arkade_runtime::*;
pub use arkade_scheduler::*;
pub use arkade_storage_impl::*;
pub use arkade_transaction::*;
