//! [SupervisorActor] services for the supervisor.
//!
//! [SupervisorActor]: super::SupervisorActor

mod traits;
pub use traits::SupervisorActor;

mod metric;
pub use metric::MetricWorker;

mod processor;
pub use processor::{ChainProcessorActor, ChainProcessorActorError};

mod node;
pub use node::{ManagedNodeActor, ManagedNodeActorError};

mod rpc;
pub use rpc::{SupervisorRpcActor, SupervisorRpcActorError};

pub(super) mod utils;
