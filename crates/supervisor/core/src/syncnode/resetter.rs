use super::{ManagedNodeClient, ManagedNodeError};
use crate::config::Tuning;
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use backon::{ExponentialBuilder, Retryable};
use interop_supervisor_storage::{DerivationStorageReader, HeadRefStorageReader, StorageError};
use interop_supervisor_types::{BlockRef, SuperHead};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// How hard the resetter tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    /// Total reset attempts.
    pub attempts: usize,
    /// Delay before the first retry.
    pub backoff_base: Duration,
    /// Upper bound of one attempt.
    pub timeout: Duration,
}

impl From<&Tuning> for ResetPolicy {
    fn from(tuning: &Tuning) -> Self {
        Self {
            attempts: tuning.reset_retry_budget.max(1),
            backoff_base: tuning.reset_backoff_base,
            timeout: tuning.reset_timeout,
        }
    }
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::from(&Tuning::default())
    }
}

/// Heads handed to `interop_reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResetHeads {
    local_unsafe: BlockNumHash,
    cross_unsafe: BlockNumHash,
    local_safe: BlockNumHash,
    cross_safe: BlockNumHash,
    finalized: BlockNumHash,
}

#[derive(Debug)]
pub(super) struct Resetter<DB, C> {
    client: Arc<C>,
    db_provider: Arc<DB>,
    policy: ResetPolicy,
    reset_guard: Mutex<()>,
}

impl<DB, C> Resetter<DB, C>
where
    DB: HeadRefStorageReader + DerivationStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    /// Creates a new [`Resetter`] with the specified client.
    pub(super) fn new(client: Arc<C>, db_provider: Arc<DB>, policy: ResetPolicy) -> Self {
        Self { client, db_provider, policy, reset_guard: Mutex::new(()) }
    }

    /// Resets the node so that no head is above `target`.
    pub(crate) async fn reset_to(&self, target: BlockNumHash) -> Result<(), ManagedNodeError> {
        let chain_id = self.client.chain_id().await?;
        let _guard = self.reset_guard.lock().await;

        let heads = self.heads_at(target)?;
        info!(
            target: "supervisor::managed_node",
            %chain_id,
            local_unsafe = heads.local_unsafe.number,
            cross_unsafe = heads.cross_unsafe.number,
            local_safe = heads.local_safe.number,
            cross_safe = heads.cross_safe.number,
            finalized = heads.finalized.number,
            "Resetting managed node",
        );

        if self.node_at(heads).await {
            info!(target: "supervisor::managed_node", %chain_id, "Managed node already at reset target, skipping reset");
            return Ok(());
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.policy.backoff_base)
            .with_max_times(self.policy.attempts.saturating_sub(1));

        (|| async { self.try_reset(heads).await })
            .retry(backoff)
            .notify(|err, delay| {
                warn!(target: "supervisor::managed_node", %chain_id, %err, ?delay, "Reset attempt failed, retrying");
            })
            .await
            .map_err(|err| {
                error!(target: "supervisor::managed_node", %chain_id, %err, "Giving up on resetting managed node");
                ManagedNodeError::ResetBudgetExhausted { attempts: self.policy.attempts }
            })
    }

    /// Resets the node to the latest local-safe block both sides agree on.
    pub(crate) async fn reset(&self) -> Result<(), ManagedNodeError> {
        let chain_id = self.client.chain_id().await?;

        let local_safe = match self.get_latest_valid_local_safe(chain_id).await {
            Ok(block) => block,
            Err(ManagedNodeError::StorageError(StorageError::DatabaseNotInitialised)) => {
                info!(target: "supervisor::managed_node", %chain_id, "Nothing derived yet, skipping reset");
                return Ok(());
            }
            Err(err) => {
                error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to get latest valid derived block");
                return Err(err);
            }
        };

        self.reset_to(local_safe.id()).await
    }

    /// Whether the node reports exactly the given heads. An unknown status counts as a mismatch.
    async fn node_at(&self, heads: ResetHeads) -> bool {
        let status = match self.client.sync_status().await {
            Ok(status) => status,
            Err(err) => {
                debug!(target: "supervisor::managed_node", %err, "Failed to get sync status before reset");
                return false;
            }
        };
        status.unsafe_l2.id() == heads.local_unsafe &&
            status.cross_unsafe_l2.id() == heads.cross_unsafe &&
            status.local_safe_l2.id() == heads.local_safe &&
            status.safe_l2.id() == heads.cross_safe &&
            status.finalized_l2.id() == heads.finalized
    }

    async fn try_reset(&self, heads: ResetHeads) -> Result<(), ManagedNodeError> {
        let call = self.client.reset(
            heads.local_unsafe,
            heads.cross_unsafe,
            heads.local_safe,
            heads.cross_safe,
            heads.finalized,
        );
        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ManagedNodeError::Timeout(self.policy.timeout)),
        }
    }

    fn heads_at(&self, target: BlockNumHash) -> Result<ResetHeads, ManagedNodeError> {
        let SuperHead { cross_unsafe, local_safe, cross_safe, finalized, .. } =
            self.db_provider.get_super_head()?;

        // Heads that are not set yet fall back to the activation block.
        let fallback = match self.db_provider.get_activation_block() {
            Ok(block) => block.id(),
            Err(StorageError::DatabaseNotInitialised) => target,
            Err(err) => return Err(err.into()),
        };
        let capped = |head: Option<BlockRef>| match head {
            Some(block) if block.number <= target.number => block.id(),
            Some(_) => target,
            None if fallback.number <= target.number => fallback,
            None => target,
        };

        Ok(ResetHeads {
            local_unsafe: target,
            cross_unsafe: capped(cross_unsafe),
            local_safe: capped(local_safe),
            cross_safe: capped(cross_safe),
            finalized: capped(finalized),
        })
    }

    async fn get_latest_valid_local_safe(
        &self,
        chain_id: ChainId,
    ) -> Result<BlockRef, ManagedNodeError> {
        let mut local_safe = self.db_provider.latest_derivation_state()?.derived;

        loop {
            let node_block = self.client.l2_block_ref_by_number(local_safe.number).await.inspect_err(
                |err| error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to get block by number"),
            )?;

            if node_block.block == local_safe {
                return Ok(local_safe);
            }

            // Step back a whole source block at a time, derived blocks of one source are
            // replaced together.
            let source = self.db_provider.derived_to_source(local_safe.id())?;
            if source.number == 0 {
                error!(target: "supervisor::managed_node", %chain_id, "Reached L1 genesis without a matching block");
                return Err(ManagedNodeError::InconsistentBlock(local_safe.number));
            }
            let prev_source = BlockNumHash { number: source.number - 1, hash: source.parent_hash };

            local_safe = self.db_provider.latest_derived_block_at_source(prev_source).inspect_err(|err| {
                error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to get latest derived block for the previous source block")
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncnode::{ClientError, client::MockManagedNodeClient};
    use alloy_primitives::B256;
    use interop_supervisor_types::{DerivedRefPair, L2BlockRef, NodeSyncStatus, SafetyLevel};
    use std::sync::atomic::{AtomicBool, Ordering};
    use mockall::{mock, predicate};

    mock! {
        #[derive(Debug)]
        pub Db {}

        impl HeadRefStorageReader for Db {
            fn get_safety_head_ref(&self, level: SafetyLevel) -> Result<BlockRef, StorageError>;
            fn get_super_head(&self) -> Result<SuperHead, StorageError>;
        }

        impl DerivationStorageReader for Db {
            fn derived_to_source(&self, derived: BlockNumHash) -> Result<BlockRef, StorageError>;
            fn latest_derived_block_at_source(&self, source: BlockNumHash) -> Result<BlockRef, StorageError>;
            fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;
            fn get_source_block(&self, number: u64) -> Result<BlockRef, StorageError>;
            fn get_activation_block(&self) -> Result<BlockRef, StorageError>;
        }
    }

    fn block(number: u64, byte: u8) -> BlockRef {
        BlockRef::new(B256::repeat_byte(byte), number, B256::ZERO, number * 2)
    }

    fn super_head() -> SuperHead {
        SuperHead {
            l1_source: Some(block(100, 54)),
            local_unsafe: Some(block(5, 0)),
            cross_unsafe: Some(block(4, 1)),
            local_safe: Some(block(3, 2)),
            cross_safe: Some(block(2, 3)),
            finalized: None,
        }
    }

    fn fast_policy(attempts: usize) -> ResetPolicy {
        ResetPolicy {
            attempts,
            backoff_base: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_reset_to_caps_heads_at_target() {
        let mut db = MockDb::new();
        db.expect_get_super_head().returning(|| Ok(super_head()));
        db.expect_get_activation_block().returning(|| Ok(block(1, 9)));

        let target = block(3, 2).id();
        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_sync_status().returning(|| Err(ClientError::NoEvent));
        client
            .expect_reset()
            .with(
                predicate::eq(target),
                predicate::eq(block(3, 2).id()),
                predicate::eq(block(3, 2).id()),
                predicate::eq(block(2, 3).id()),
                predicate::eq(block(1, 9).id()),
            )
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));

        let resetter = Resetter::new(Arc::new(client), Arc::new(db), fast_policy(3));
        assert!(resetter.reset_to(target).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_to_retries_then_succeeds() {
        let mut db = MockDb::new();
        db.expect_get_super_head().returning(|| Ok(super_head()));
        db.expect_get_activation_block().returning(|| Ok(block(1, 9)));

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_sync_status().returning(|| Err(ClientError::NoEvent));
        let mut calls = 0;
        client.expect_reset().times(2).returning(move |_, _, _, _, _| {
            calls += 1;
            if calls == 1 { Err(ClientError::NoEvent) } else { Ok(()) }
        });

        let resetter = Resetter::new(Arc::new(client), Arc::new(db), fast_policy(3));
        assert!(resetter.reset_to(block(3, 2).id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_to_exhausts_budget() {
        let mut db = MockDb::new();
        db.expect_get_super_head().returning(|| Ok(super_head()));
        db.expect_get_activation_block().returning(|| Ok(block(1, 9)));

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_sync_status().returning(|| Err(ClientError::NoEvent));
        client.expect_reset().times(3).returning(|_, _, _, _, _| Err(ClientError::NoEvent));

        let resetter = Resetter::new(Arc::new(client), Arc::new(db), fast_policy(3));
        assert_eq!(
            resetter.reset_to(block(3, 2).id()).await,
            Err(ManagedNodeError::ResetBudgetExhausted { attempts: 3 })
        );
    }

    fn l2(block: BlockRef) -> L2BlockRef {
        L2BlockRef::new(block, BlockNumHash::default(), 0)
    }

    #[tokio::test]
    async fn test_reset_to_is_noop_when_node_already_at_target() {
        let mut db = MockDb::new();
        db.expect_get_super_head().returning(|| Ok(super_head()));
        db.expect_get_activation_block().returning(|| Ok(block(1, 9)));

        let target = block(3, 2);
        let at_target = NodeSyncStatus {
            unsafe_l2: l2(target),
            cross_unsafe_l2: l2(target),
            local_safe_l2: l2(target),
            safe_l2: l2(block(2, 3)),
            finalized_l2: l2(block(1, 9)),
            ..Default::default()
        };
        let before_reset = NodeSyncStatus { unsafe_l2: l2(block(5, 0)), ..at_target };

        let reset_done = Arc::new(AtomicBool::new(false));
        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        let done = reset_done.clone();
        client.expect_sync_status().returning(move || {
            Ok(if done.load(Ordering::SeqCst) { at_target } else { before_reset })
        });
        let done = reset_done.clone();
        client.expect_reset().times(1).returning(move |_, _, _, _, _| {
            done.store(true, Ordering::SeqCst);
            Ok(())
        });

        let resetter = Resetter::new(Arc::new(client), Arc::new(db), fast_policy(3));
        assert!(resetter.reset_to(target.id()).await.is_ok());
        assert!(resetter.reset_to(target.id()).await.is_ok());
        assert!(resetter.reset_to(target.id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_walks_back_to_matching_block() {
        let mut db = MockDb::new();
        let stale = block(3, 2);
        let older = block(2, 3);
        db.expect_latest_derivation_state()
            .returning(move || Ok(DerivedRefPair::new(block(100, 54), stale)));
        db.expect_derived_to_source()
            .with(predicate::eq(stale.id()))
            .returning(|_| Ok(BlockRef::new(B256::repeat_byte(54), 100, B256::repeat_byte(53), 0)));
        db.expect_latest_derived_block_at_source()
            .with(predicate::eq(BlockNumHash { number: 99, hash: B256::repeat_byte(53) }))
            .returning(move |_| Ok(older));
        db.expect_get_super_head().returning(|| Ok(super_head()));
        db.expect_get_activation_block().returning(|| Ok(block(1, 9)));

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_sync_status().returning(|| Err(ClientError::NoEvent));
        client.expect_l2_block_ref_by_number().returning(move |number| {
            let block = if number == 3 { block(3, 7) } else { older };
            Ok(L2BlockRef::new(block, BlockNumHash::default(), 0))
        });
        client
            .expect_reset()
            .withf(move |lu, _, ls, _, _| *lu == older.id() && *ls == older.id())
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));

        let resetter = Resetter::new(Arc::new(client), Arc::new(db), fast_policy(1));
        assert!(resetter.reset().await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_skipped_without_derivation() {
        let mut db = MockDb::new();
        db.expect_latest_derivation_state().returning(|| Err(StorageError::DatabaseNotInitialised));

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_sync_status().returning(|| Err(ClientError::NoEvent));
        client.expect_reset().never();

        let resetter = Resetter::new(Arc::new(client), Arc::new(db), fast_policy(1));
        assert!(resetter.reset().await.is_ok());
    }
}
