use interop_supervisor_rpc::ChainHealthStatus;

/// Lifecycle of a chain processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProcessorStatus {
    /// Waiting for the next event.
    #[default]
    Idle,
    /// Handling an event.
    ProcessingEvent,
    /// Stopped after a fatal error; only a recovery request is handled.
    Faulted {
        /// The error that stopped the processor.
        reason: String,
    },
}

/// Health of a chain processor, published through a [`tokio::sync::watch`] channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorHealth {
    /// Current lifecycle state.
    pub status: ProcessorStatus,
    /// Whether promotion is paused while an L1 reorg is reconciled.
    pub suspended: bool,
}

impl ProcessorHealth {
    /// Returns `true` if the processor stopped after a fatal error.
    pub const fn is_faulted(&self) -> bool {
        matches!(self.status, ProcessorStatus::Faulted { .. })
    }

    /// Returns the fault reason, if any.
    pub fn fault_reason(&self) -> Option<&str> {
        match &self.status {
            ProcessorStatus::Faulted { reason } => Some(reason),
            _ => None,
        }
    }

    /// Operator-facing summary. A fault outranks a suspension.
    pub const fn health_status(&self) -> ChainHealthStatus {
        if self.is_faulted() {
            ChainHealthStatus::Faulted
        } else if self.suspended {
            ChainHealthStatus::Suspended
        } else {
            ChainHealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status() {
        let mut health = ProcessorHealth::default();
        assert_eq!(health.health_status(), ChainHealthStatus::Healthy);

        health.suspended = true;
        assert_eq!(health.health_status(), ChainHealthStatus::Suspended);

        health.status = ProcessorStatus::Faulted { reason: "gap".into() };
        assert_eq!(health.health_status(), ChainHealthStatus::Faulted);
        assert_eq!(health.fault_reason(), Some("gap"));
    }
}
