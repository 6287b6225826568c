//! Managed node adapter.
//!
//! Talks to one op-node style consensus node per chain over its interop RPC, turning its
//! events into [`ChainEvent`](crate::event::ChainEvent)s and executing the commands the chain
//! processor issues.

mod command;
pub use command::ManagedNodeCommand;

mod node;
pub use node::ManagedNode;

mod error;
pub use error::{AuthenticationError, ClientError, ManagedNodeError};

mod traits;
pub use traits::{
    BlockProvider, ManagedNodeAdmin, ManagedNodeController, ManagedNodeDataProvider,
    ManagedNodeProvider, SubscriptionHandler,
};
#[cfg(test)]
pub(crate) use traits::{MockBlockProvider, MockManagedNodeController, MockManagedNodeDataProvider};

mod client;
pub use client::{Client, ClientConfig, EventDelivery, ManagedNodeClient};

pub(super) mod metrics;

mod resetter;
pub use resetter::ResetPolicy;
