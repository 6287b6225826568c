//! JSON-RPC surface of the interop supervisor.
//!
//! Defines the `supervisor_*` query API and the `admin_*` operator API the supervisor serves, the
//! `interop_*` managed mode API it drives nodes with, and the node-side `optimism_*`, `opp2p_*`
//! and `admin_*` APIs it calls for node administration.

#[cfg(feature = "jsonrpsee")]
pub mod jsonrpsee;
#[cfg(feature = "client")]
pub use jsonrpsee::{
    ManagedModeApiClient, NodeAdminApiClient, NodeP2pApiClient, NodeRollupApiClient,
    SupervisorAdminApiClient, SupervisorApiClient,
};
#[cfg(feature = "jsonrpsee")]
pub use jsonrpsee::{ManagedModeApiServer, SupervisorAdminApiServer, SupervisorApiServer};

pub mod response;
pub use response::{
    ChainHealth, ChainHealthStatus, ChainRootInfoRpc, SuperRootOutputRpc,
    SupervisorChainSyncStatus, SupervisorSyncStatus,
};
