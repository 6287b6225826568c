//! Supervisor RPC module

mod server;
pub use server::SupervisorRpc;

mod admin;
pub use admin::AdminRpc;

mod metrics;
pub(crate) use metrics::Metrics;
