use async_trait::async_trait;

/// A long-running unit of the supervisor service. Runs until its work is done, it is cancelled,
/// or it fails.
#[async_trait]
pub trait SupervisorActor {
    /// The event type received by the actor.
    type InboundEvent;
    /// The error type for the actor.
    type Error: std::fmt::Debug + std::fmt::Display;
    /// Runs the actor to completion.
    async fn start(mut self) -> Result<(), Self::Error>;
}
