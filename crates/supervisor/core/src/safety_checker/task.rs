use super::metrics::Metrics;
use crate::{
    CrossSafetyError,
    event::ChainEvent,
    safety_checker::{CrossSafetyChecker, traits::SafetyPromoter},
};
use alloy_primitives::ChainId;
use derive_more::Constructor;
use interop_supervisor_storage::{CrossChainSafetyProvider, StorageError};
use interop_supervisor_types::{BlockRef, InteropValidator, SafetyLevel};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A background job that promotes blocks to a target safety level on a given chain.
///
/// It uses [`CrossChainSafetyProvider`] to fetch candidate blocks and the [`CrossSafetyChecker`]
/// to validate cross-chain message dependencies. Validated blocks are sent to the chain processor
/// as [`ChainEvent::SafetyPromoted`], strictly in block number order.
#[derive(Debug, Constructor)]
pub struct CrossSafetyCheckerJob<P, V, L> {
    chain_id: ChainId,
    provider: Arc<P>,
    cancel_token: CancellationToken,
    interval: Duration,
    promoter: L,
    event_tx: mpsc::Sender<ChainEvent>,
    validator: Arc<V>,
}

impl<P, V, L> CrossSafetyCheckerJob<P, V, L>
where
    P: CrossChainSafetyProvider + Send + Sync + 'static,
    V: InteropValidator + 'static,
    L: SafetyPromoter,
{
    /// Initializes the metrics of the job.
    pub fn with_metrics(self) -> Self {
        Metrics::init(self.chain_id, self.promoter.target_level());
        self
    }

    /// Runs the job loop until cancelled, promoting blocks by Promoter
    ///
    /// On each iteration:
    /// - Tries to promote the next eligible block
    /// - Waits for configured interval if promotion fails
    /// - Exits when [`CancellationToken`] is triggered
    pub async fn run(self) {
        let target_level = self.promoter.target_level();
        let chain_id = self.chain_id;

        info!(
            target: "supervisor::safety_checker",
            chain_id,
            %target_level,
            "Started safety checker"
        );

        let checker =
            CrossSafetyChecker::new(chain_id, &*self.validator, &*self.provider, target_level);
        // Last block sent to the processor that may not be applied yet.
        let mut pending = None;

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(target: "supervisor::safety_checker", chain_id, %target_level, "Canceled safety checker");
                    break;
                }

                _ = async {
                    match self.promote_next_block(&checker, pending).await {
                        Ok(block) => {
                            debug!(
                                target: "supervisor::safety_checker",
                                chain_id,
                                %target_level,
                                %block,
                                "Promoted next candidate block"
                            );
                            pending = Some(block);
                        }
                        Err(err) => {
                            pending = None;
                            self.log_error(&err);
                            tokio::time::sleep(self.interval).await;
                        }
                    }
                } => {}
            }
        }

        info!(target: "supervisor::safety_checker", chain_id, %target_level, "Stopped safety checker");
    }

    fn log_error(&self, err: &CrossSafetyError) {
        let target_level = self.promoter.target_level();
        match err {
            CrossSafetyError::NoBlockToPromote => {}
            CrossSafetyError::DependencyNotSafe { .. } => {
                Metrics::record(Metrics::DEFERRALS_TOTAL, self.chain_id, target_level);
                debug!(
                    target: "supervisor::safety_checker",
                    chain_id = self.chain_id,
                    %target_level,
                    %err,
                    "Candidate block deferred"
                );
            }
            CrossSafetyError::ValidationError(_) => {
                Metrics::record(Metrics::INVALIDATIONS_TOTAL, self.chain_id, target_level);
                warn!(
                    target: "supervisor::safety_checker",
                    chain_id = self.chain_id,
                    %target_level,
                    %err,
                    "Candidate block failed validation"
                );
            }
            CrossSafetyError::Storage(_) => {
                error!(
                    target: "supervisor::safety_checker",
                    chain_id = self.chain_id,
                    %target_level,
                    %err,
                    "Unexpected error promoting next candidate block"
                );
            }
        }
    }

    /// Validates the block after `pending`, or after the current head if nothing is pending, and
    /// sends the promotion event.
    ///
    /// For a cross-safe target a block failing validation is sent for invalidation.
    async fn promote_next_block(
        &self,
        checker: &CrossSafetyChecker<'_, P, V>,
        pending: Option<BlockRef>,
    ) -> Result<BlockRef, CrossSafetyError> {
        let candidate = self.find_next_promotable_block(pending)?;

        match checker.validate_block(candidate) {
            Ok(()) => {
                Metrics::record(
                    Metrics::PROMOTIONS_TOTAL,
                    self.chain_id,
                    self.promoter.target_level(),
                );
                self.broadcast_event(self.promoter.promotion_event(candidate)).await;
                Ok(candidate)
            }

            Err(err @ CrossSafetyError::ValidationError(_)) => {
                if self.promoter.invalidates() {
                    info!(
                        target: "supervisor::safety_checker",
                        chain_id = self.chain_id,
                        target_level = %self.promoter.target_level(),
                        block = %candidate,
                        %err,
                        "Triggering block invalidation for the invalid block"
                    );
                    self.broadcast_event(ChainEvent::InvalidateBlock { block: candidate }).await;
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Finds the next block that is eligible for promotion at the configured target level.
    fn find_next_promotable_block(
        &self,
        pending: Option<BlockRef>,
    ) -> Result<BlockRef, CrossSafetyError> {
        let current_head = self.head(self.promoter.target_level())?;
        let upper_head = self.head(self.promoter.lower_bound_level())?;

        let base = pending.filter(|block| block.number > current_head.number).unwrap_or(current_head);
        if base.number >= upper_head.number {
            return Err(CrossSafetyError::NoBlockToPromote);
        }

        let candidate = self.provider.get_block(self.chain_id, base.number + 1)?;
        if !base.is_parent_of(&candidate) {
            // storage was rewound underneath
            return Err(CrossSafetyError::NoBlockToPromote);
        }
        Ok(candidate)
    }

    fn head(&self, level: SafetyLevel) -> Result<BlockRef, CrossSafetyError> {
        self.provider.get_safety_head_ref(self.chain_id, level).map_err(|err| {
            if matches!(err, StorageError::FutureData) {
                CrossSafetyError::NoBlockToPromote
            } else {
                err.into()
            }
        })
    }

    async fn broadcast_event(&self, event: ChainEvent) {
        if let Err(err) = self.event_tx.send(event).await {
            error!(
                target: "supervisor::safety_checker",
                chain_id = self.chain_id,
                target_level = %self.promoter.target_level(),
                %err,
                "Failed to send safety event",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety_checker::{
        ValidationError,
        cross::tests::{MockProvider, MockValidator, b256, block, executing_log},
        promoter::{CrossSafePromoter, CrossUnsafePromoter},
    };
    use interop_supervisor_types::{ExecutingMessage, InteropValidationError};

    fn job<L: SafetyPromoter>(
        provider: MockProvider,
        validator: MockValidator,
        promoter: L,
    ) -> (CrossSafetyCheckerJob<MockProvider, MockValidator, L>, mpsc::Receiver<ChainEvent>) {
        let (event_tx, event_rx) = mpsc::channel(10);
        let job = CrossSafetyCheckerJob::new(
            1,
            Arc::new(provider),
            CancellationToken::new(),
            Duration::from_secs(1),
            promoter,
            event_tx,
            Arc::new(validator),
        );
        (job, event_rx)
    }

    fn heads(provider: &mut MockProvider, target: (SafetyLevel, u64), upper: (SafetyLevel, u64)) {
        provider
            .expect_get_safety_head_ref()
            .withf(move |cid, lvl| *cid == 1 && *lvl == target.0)
            .returning(move |_, _| Ok(block(1, target.1, target.1 * 2)));
        provider
            .expect_get_safety_head_ref()
            .withf(move |cid, lvl| *cid == 1 && *lvl == upper.0)
            .returning(move |_, _| Ok(block(1, upper.1, upper.1 * 2)));
    }

    #[tokio::test]
    async fn promotes_next_cross_unsafe_successfully() {
        let mut provider = MockProvider::new();
        heads(&mut provider, (SafetyLevel::CrossUnsafe, 99), (SafetyLevel::LocalUnsafe, 100));
        provider
            .expect_get_block()
            .withf(|cid, n| *cid == 1 && *n == 100)
            .returning(|_, _| Ok(block(1, 100, 200)));
        provider.expect_get_block_logs().returning(|_, _| Ok(vec![]));

        let (job, mut event_rx) = job(provider, MockValidator::new(), CrossUnsafePromoter);
        let checker = CrossSafetyChecker::new(1, &*job.validator, &*job.provider, SafetyLevel::CrossUnsafe);

        let promoted = job.promote_next_block(&checker, None).await.unwrap();
        assert_eq!(promoted.number, 100);
        assert_eq!(
            event_rx.recv().await.unwrap(),
            ChainEvent::SafetyPromoted { level: SafetyLevel::CrossUnsafe, block: block(1, 100, 200) }
        );
    }

    #[tokio::test]
    async fn promotes_after_pending_block() {
        let mut provider = MockProvider::new();
        heads(&mut provider, (SafetyLevel::CrossSafe, 99), (SafetyLevel::LocalSafe, 102));
        provider
            .expect_get_block()
            .withf(|cid, n| *cid == 1 && *n == 101)
            .returning(|_, _| Ok(block(1, 101, 202)));
        provider.expect_get_block_logs().returning(|_, _| Ok(vec![]));

        let (job, mut event_rx) = job(provider, MockValidator::new(), CrossSafePromoter);
        let checker = CrossSafetyChecker::new(1, &*job.validator, &*job.provider, SafetyLevel::CrossSafe);

        let promoted =
            job.promote_next_block(&checker, Some(block(1, 100, 200))).await.unwrap();
        assert_eq!(promoted.number, 101);
        assert_eq!(
            event_rx.recv().await.unwrap(),
            ChainEvent::SafetyPromoted { level: SafetyLevel::CrossSafe, block: block(1, 101, 202) }
        );
    }

    #[tokio::test]
    async fn promotes_next_cross_safe_triggers_block_invalidation() {
        let exec_msg =
            ExecutingMessage { chain_id: 2, block_number: 99, log_index: 0, timestamp: 195, hash: b256(2, 99) };

        let mut provider = MockProvider::new();
        heads(&mut provider, (SafetyLevel::CrossSafe, 99), (SafetyLevel::LocalSafe, 100));
        provider
            .expect_get_block()
            .withf(|cid, n| *cid == 1 && *n == 100)
            .returning(|_, _| Ok(block(1, 100, 200)));
        provider
            .expect_get_block_logs()
            .withf(|cid, n| *cid == 1 && *n == 100)
            .returning(move |_, _| Ok(vec![executing_log(0, exec_msg)]));

        let mut validator = MockValidator::new();
        validator.expect_validate_interop_timestamps().returning(|_, _, _, _, _| {
            Err(InteropValidationError::InvalidTimestampInvariant { executing: 0, initiating: 0 })
        });

        let (job, mut event_rx) = job(provider, validator, CrossSafePromoter);
        let checker = CrossSafetyChecker::new(1, &*job.validator, &*job.provider, SafetyLevel::CrossSafe);

        let result = job.promote_next_block(&checker, None).await;
        assert!(matches!(
            result,
            Err(CrossSafetyError::ValidationError(ValidationError::InteropValidationError(_)))
        ));
        assert_eq!(
            event_rx.recv().await.unwrap(),
            ChainEvent::InvalidateBlock { block: block(1, 100, 200) }
        );
    }

    #[tokio::test]
    async fn invalid_cross_unsafe_block_is_not_invalidated() {
        let exec_msg =
            ExecutingMessage { chain_id: 2, block_number: 99, log_index: 0, timestamp: 195, hash: b256(2, 99) };

        let mut provider = MockProvider::new();
        heads(&mut provider, (SafetyLevel::CrossUnsafe, 99), (SafetyLevel::LocalUnsafe, 100));
        provider.expect_get_block().returning(|_, _| Ok(block(1, 100, 200)));
        provider.expect_get_block_logs().returning(move |_, _| Ok(vec![executing_log(0, exec_msg)]));

        let mut validator = MockValidator::new();
        validator
            .expect_validate_interop_timestamps()
            .returning(|_, _, _, _, _| Err(InteropValidationError::InteropNotEnabled));

        let (job, mut event_rx) = job(provider, validator, CrossUnsafePromoter);
        let checker = CrossSafetyChecker::new(1, &*job.validator, &*job.provider, SafetyLevel::CrossUnsafe);

        assert!(job.promote_next_block(&checker, None).await.is_err());
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn no_candidate_when_level_caught_up() {
        let mut provider = MockProvider::new();
        heads(&mut provider, (SafetyLevel::CrossSafe, 200), (SafetyLevel::LocalSafe, 200));

        let (job, _event_rx) = job(provider, MockValidator::new(), CrossSafePromoter);
        let checker = CrossSafetyChecker::new(1, &*job.validator, &*job.provider, SafetyLevel::CrossSafe);

        assert!(matches!(
            job.promote_next_block(&checker, None).await,
            Err(CrossSafetyError::NoBlockToPromote)
        ));
    }

    #[tokio::test]
    async fn no_candidate_when_storage_was_rewound() {
        let mut provider = MockProvider::new();
        heads(&mut provider, (SafetyLevel::CrossSafe, 99), (SafetyLevel::LocalSafe, 102));
        // 101 no longer builds on the pending 100
        provider.expect_get_block().returning(|_, _| {
            Ok(BlockRef::new(b256(3, 101), 101, b256(3, 100), 202))
        });

        let (job, _event_rx) = job(provider, MockValidator::new(), CrossSafePromoter);
        let checker = CrossSafetyChecker::new(1, &*job.validator, &*job.provider, SafetyLevel::CrossSafe);

        assert!(matches!(
            job.promote_next_block(&checker, Some(block(1, 100, 200))).await,
            Err(CrossSafetyError::NoBlockToPromote)
        ));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let mut provider = MockProvider::new();
        provider.expect_get_safety_head_ref().returning(|_, _| Err(StorageError::FutureData));
        let (job, _event_rx) = job(provider, MockValidator::new(), CrossSafePromoter);
        job.cancel_token.cancel();
        job.run().await;
    }
}
