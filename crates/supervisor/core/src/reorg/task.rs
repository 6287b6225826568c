use crate::ReorgHandlerError;
use alloy_eips::{BlockNumHash, BlockNumberOrTag};
use alloy_primitives::ChainId;
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::Block;
use backon::{ExponentialBuilder, Retryable};
use derive_more::Constructor;
use interop_supervisor_storage::{DbReader, EntryNotFoundError, StorageError};
use interop_supervisor_types::L2BlockRef;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, trace, warn};

/// Attempts made for one L1 RPC call before the reorg step fails.
const L1_RPC_ATTEMPTS: usize = 3;

/// Where a chain has to be rewound to after an L1 reorg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RewindTarget {
    /// Highest stored L2 block built on canonical L1.
    pub(crate) target: L2BlockRef,
    /// Stored head when the search started.
    pub(crate) head: L2BlockRef,
}

/// Reorg search for a single chain.
#[derive(Debug, Constructor)]
pub(crate) struct ReorgTask<DB> {
    chain_id: ChainId,
    db: Arc<DB>,
    rpc_client: RpcClient,
    activation_block: u64,
    lookback: u64,
}

impl<DB> ReorgTask<DB>
where
    DB: DbReader + Send + Sync + 'static,
{
    /// Finds the highest stored L2 block whose L1 origin is at or below `l1_ancestor` and still
    /// canonical.
    ///
    /// Blocks built on L1 above the ancestor are skipped without asking L1. From the first block
    /// at or below it, at most `lookback` blocks are checked, never going below the activation
    /// block.
    pub(crate) async fn find_rewind_target(
        &self,
        l1_ancestor: BlockNumHash,
    ) -> Result<RewindTarget, ReorgHandlerError> {
        trace!(
            target: "supervisor::reorg_handler",
            chain_id = %self.chain_id,
            l1_ancestor = l1_ancestor.number,
            "Finding rewind target..."
        );

        let head = self.db.get_latest_block()?;
        let mut block = head;
        while block.l1_origin.number > l1_ancestor.number {
            if block.number() <= self.activation_block {
                return Err(ReorgHandlerError::RewindTargetPreInterop {
                    l1_ancestor: l1_ancestor.number,
                });
            }
            block = self.db.get_block(block.number() - 1)?;
        }

        let floor = block.number().saturating_sub(self.lookback).max(self.activation_block);
        let mut last_checked: Option<(BlockNumHash, bool)> = None;
        loop {
            let origin = block.l1_origin;
            let canonical = match last_checked {
                _ if origin == l1_ancestor => true,
                Some((checked, canonical)) if checked == origin => canonical,
                _ => {
                    let canonical = self.is_block_canonical(origin).await?;
                    last_checked = Some((origin, canonical));
                    canonical
                }
            };

            if canonical {
                info!(
                    target: "supervisor::reorg_handler",
                    chain_id = %self.chain_id,
                    target_block = block.number(),
                    head = head.number(),
                    l1_origin = origin.number,
                    "Found rewind target"
                );
                return Ok(RewindTarget { target: block, head });
            }

            if block.number() <= floor {
                warn!(
                    target: "supervisor::reorg_handler",
                    chain_id = %self.chain_id,
                    floor,
                    head = head.number(),
                    "No L2 block built on canonical L1 within lookback"
                );
                return Err(if floor == self.activation_block {
                    ReorgHandlerError::RewindTargetPreInterop { l1_ancestor: l1_ancestor.number }
                } else {
                    ReorgHandlerError::ReorgTooDeep { floor }
                });
            }
            block = self.db.get_block(block.number() - 1)?;
        }
    }

    /// Checks that the L1 source of the latest derived block is still canonical.
    ///
    /// Returns the highest stored source block that is, when it is not. If none of them is, the
    /// canonical L1 block right below the first source is returned.
    pub(crate) async fn find_l1_divergence(
        &self,
    ) -> Result<Option<BlockNumHash>, ReorgHandlerError> {
        let latest = match self.db.latest_derivation_state() {
            Ok(latest) => latest,
            Err(StorageError::DatabaseNotInitialised) => {
                debug!(
                    target: "supervisor::reorg_handler",
                    chain_id = %self.chain_id,
                    "Nothing derived yet, no L1 consistency check needed"
                );
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        if self.is_block_canonical(latest.source.id()).await? {
            return Ok(None);
        }

        let mut number = latest.source.number;
        while number > 0 {
            number -= 1;
            let source = match self.db.get_source_block(number) {
                Ok(source) => source,
                Err(StorageError::EntryNotFound(EntryNotFoundError::SourceBlockNotFound(_))) => {
                    break;
                }
                Err(err) => return Err(err.into()),
            };
            if self.is_block_canonical(source.id()).await? {
                return Ok(Some(source.id()));
            }
        }

        let below = self.canonical_block(number).await?;
        Ok(Some(BlockNumHash { number, hash: below.header.hash }))
    }

    /// Checks if a block is canonical on L1
    async fn is_block_canonical(&self, block: BlockNumHash) -> Result<bool, ReorgHandlerError> {
        let canonical_l1 = self.canonical_block(block.number).await?;
        Ok(canonical_l1.header.hash == block.hash)
    }

    async fn canonical_block(&self, block_number: u64) -> Result<Block, ReorgHandlerError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_times(L1_RPC_ATTEMPTS - 1);

        (|| async {
            self.rpc_client
                .request::<_, Block>(
                    "eth_getBlockByNumber",
                    (BlockNumberOrTag::Number(block_number), false),
                )
                .await
        })
        .retry(backoff)
        .notify(|err, delay| {
            warn!(
                target: "supervisor::reorg_handler",
                block_number,
                %err,
                ?delay,
                "Failed to fetch L1 block from RPC, retrying"
            );
        })
        .await
        .map_err(|err| ReorgHandlerError::RPCError(err.to_string()))
    }
}
