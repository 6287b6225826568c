use std::{io, net::SocketAddr};

use async_trait::async_trait;
use derive_more::Constructor;
use jsonrpsee::{RpcModule, server::ServerBuilder};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::SupervisorActor;

/// Serves the supervisor's JSON-RPC module until cancelled.
#[derive(Debug, Constructor)]
pub struct SupervisorRpcActor<D> {
    rpc_addr: SocketAddr,
    rpc_module: RpcModule<D>,
    cancel_token: CancellationToken,
}

#[async_trait]
impl<D> SupervisorActor for SupervisorRpcActor<D>
where
    D: Send + Sync + 'static,
{
    type InboundEvent = ();
    type Error = SupervisorRpcActorError;

    async fn start(mut self) -> Result<(), Self::Error> {
        let server = ServerBuilder::default().build(self.rpc_addr).await?;
        let local_addr = server.local_addr()?;
        info!(
            target: "supervisor::rpc_actor",
            addr = %local_addr,
            methods = self.rpc_module.method_names().count(),
            "RPC server bound to address",
        );

        let handle = server.start(self.rpc_module);
        let stopped = handle.clone().stopped();

        tokio::select! {
            _ = stopped => {
                error!(target: "supervisor::rpc_actor", "RPC server stopped unexpectedly");
                return Err(SupervisorRpcActorError::ServerStopped);
            }
            _ = self.cancel_token.cancelled() => {
                info!(target: "supervisor::rpc_actor", "Cancellation requested, stopping RPC server...");
                if let Err(err) = handle.stop() {
                    error!(target: "supervisor::rpc_actor", %err, "Failed to stop RPC server gracefully");
                    return Err(SupervisorRpcActorError::StopFailed);
                }
                handle.stopped().await;
                info!(target: "supervisor::rpc_actor", "RPC server stopped gracefully");
            }
        }

        Ok(())
    }
}

/// Errors of the [`SupervisorRpcActor`].
#[derive(Debug, Error)]
pub enum SupervisorRpcActorError {
    /// Failed to build the RPC server.
    #[error(transparent)]
    BuildFailed(#[from] io::Error),

    /// The server stopped without being asked to.
    #[error("rpc server stopped unexpectedly")]
    ServerStopped,

    /// Indicates that the RPC server failed to stop gracefully.
    #[error("failed to stop the RPC server")]
    StopFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        net::{Ipv4Addr, SocketAddr},
        time::Duration,
    };

    #[tokio::test]
    async fn test_rpc_actor_stops_on_cancel() {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let mut rpc_module = RpcModule::new(());
        rpc_module.register_method("supervisor_ping", |_, _, _| "pong").unwrap();

        let cancel_token = CancellationToken::new();
        let actor = SupervisorRpcActor::new(addr, rpc_module, cancel_token.clone());
        let handle = tokio::spawn(actor.start());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_rpc_actor_fails_on_taken_address() {
        let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let actor = SupervisorRpcActor::new(addr, RpcModule::new(()), CancellationToken::new());
        let result = actor.start().await;
        assert!(matches!(result, Err(SupervisorRpcActorError::BuildFailed(_))));
    }
}
