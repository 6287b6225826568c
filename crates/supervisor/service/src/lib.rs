//! Runnable service layer of the interop supervisor.
//! Builds every component from a [`Config`](interop_supervisor_core::config::Config), runs each
//! concern as an actor and serves the RPC API.

mod service;

pub use service::Service;

mod actors;
pub use actors::SupervisorActor;
