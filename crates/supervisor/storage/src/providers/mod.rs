//! Table access scoped to a single MDBX transaction.
//!
//! Each provider owns one concern; [`crate::ChainDb`] combines them inside one transaction when an
//! operation spans several tables.

mod block_provider;
pub(crate) use block_provider::BlockProvider;

mod derivation_provider;
pub(crate) use derivation_provider::DerivationProvider;

mod head_ref_provider;
pub(crate) use head_ref_provider::SafetyHeadRefProvider;

mod l1_provider;
pub(crate) use l1_provider::L1BlockProvider;
