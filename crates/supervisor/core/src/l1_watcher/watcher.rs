use super::L1WatcherError;
use crate::{config::Tuning, event::ChainEvent};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::ChainId;
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Block, Header};
use futures::StreamExt;
use interop_supervisor_storage::FinalizedL1Storage;
use interop_supervisor_types::BlockRef;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

/// Polling intervals and history depth of the [`L1Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1WatcherConfig {
    /// Poll interval for the latest block.
    pub poll_interval: Duration,
    /// Poll interval for the finalized block.
    pub finalized_poll_interval: Duration,
    /// Number of recent blocks kept to find the common ancestor of a reorg.
    pub history_depth: usize,
}

impl From<&Tuning> for L1WatcherConfig {
    fn from(tuning: &Tuning) -> Self {
        Self {
            poll_interval: tuning.l1_poll_interval,
            finalized_poll_interval: tuning.l1_finalized_poll_interval,
            history_depth: tuning.l1_history_depth.max(1),
        }
    }
}

/// The most recent canonical L1 blocks, oldest first, without gaps.
#[derive(Debug)]
pub(crate) struct L1History {
    blocks: VecDeque<BlockRef>,
    depth: usize,
}

impl L1History {
    pub(crate) fn new(depth: usize) -> Self {
        Self { blocks: VecDeque::with_capacity(depth), depth }
    }

    fn head(&self) -> Option<BlockRef> {
        self.blocks.back().copied()
    }

    fn get(&self, number: u64) -> Option<BlockRef> {
        let oldest = self.blocks.front()?.number;
        let index = usize::try_from(number.checked_sub(oldest)?).ok()?;
        self.blocks.get(index).copied()
    }

    fn push(&mut self, block: BlockRef) {
        if self.blocks.len() == self.depth {
            self.blocks.pop_front();
        }
        self.blocks.push_back(block);
    }

    fn truncate_above(&mut self, number: u64) {
        while self.blocks.back().is_some_and(|block| block.number > number) {
            self.blocks.pop_back();
        }
    }
}

/// A watcher that polls the L1 chain for latest and finalized blocks.
///
/// New canonical blocks are reported to every chain as [`ChainEvent::NewL1Block`]. When a block
/// does not extend the last one, the highest block still shared with the new chain is found from
/// the recent history, [`ChainEvent::L1Reorg`] is reported, and the new chain is reported block by
/// block from there. No block number is reported twice with different hashes without a reorg in
/// between.
#[derive(Debug)]
pub struct L1Watcher<F> {
    /// The Alloy RPC client for L1.
    rpc_client: RpcClient,
    /// The cancellation token, shared between all tasks.
    cancellation: CancellationToken,
    /// The finalized L1 block storage.
    finalized_l1_storage: Arc<F>,
    /// The event senders for each chain.
    event_txs: HashMap<ChainId, mpsc::Sender<ChainEvent>>,
    config: L1WatcherConfig,
}

impl<F> L1Watcher<F>
where
    F: FinalizedL1Storage + Send + Sync + 'static,
{
    /// Creates a new [`L1Watcher`] instance.
    pub const fn new(
        rpc_client: RpcClient,
        finalized_l1_storage: Arc<F>,
        event_txs: HashMap<ChainId, mpsc::Sender<ChainEvent>>,
        cancellation: CancellationToken,
        config: L1WatcherConfig,
    ) -> Self {
        Self { rpc_client, cancellation, finalized_l1_storage, event_txs, config }
    }

    /// Starts polling for finalized and latest blocks and processes them.
    pub async fn run(&self) {
        let finalized_head_stream = self
            .rpc_client
            .prepare_static_poller::<_, Block>(
                "eth_getBlockByNumber",
                (BlockNumberOrTag::Finalized, false),
            )
            .with_poll_interval(self.config.finalized_poll_interval)
            .into_stream();

        let latest_head_stream = self
            .rpc_client
            .prepare_static_poller::<_, Block>(
                "eth_getBlockByNumber",
                (BlockNumberOrTag::Latest, false),
            )
            .with_poll_interval(self.config.poll_interval)
            .into_stream();

        self.poll_blocks(finalized_head_stream, latest_head_stream).await;
    }

    /// Consumes both streams until cancelled.
    async fn poll_blocks<S>(&self, mut finalized_head_stream: S, mut latest_head_stream: S)
    where
        S: futures::Stream<Item = Block> + Unpin,
    {
        let mut finalized_number = 0;
        let mut history = L1History::new(self.config.history_depth);

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!(target: "supervisor::l1_watcher", "L1Watcher cancellation requested, stopping polling");
                    break;
                }
                latest_block = latest_head_stream.next() => {
                    let Some(latest_block) = latest_block else { break };
                    let block = block_ref(&latest_block.header);
                    if let Err(err) = self.handle_new_latest_block(block, &mut history).await {
                        warn!(
                            target: "supervisor::l1_watcher",
                            block_number = block.number,
                            %err,
                            "Failed to process latest L1 block, retrying on next poll"
                        );
                    }
                }
                finalized_block = finalized_head_stream.next() => {
                    let Some(finalized_block) = finalized_block else { break };
                    finalized_number = self
                        .handle_new_finalized_block(block_ref(&finalized_block.header), finalized_number)
                        .await;
                }
            }
        }
    }

    /// Handles a new finalized block, updating the storage and broadcasting the event.
    ///
    /// Returns the new finalized block number.
    async fn handle_new_finalized_block(&self, block: BlockRef, last_finalized_number: u64) -> u64 {
        if block.number <= last_finalized_number {
            return last_finalized_number;
        }

        trace!(
            target: "supervisor::l1_watcher",
            incoming_block_number = block.number,
            previous_block_number = last_finalized_number,
            "Finalized L1 block received"
        );

        if let Err(err) = self.finalized_l1_storage.update_finalized_l1(block) {
            error!(target: "supervisor::l1_watcher", %err, "Failed to update finalized L1 block");
            return last_finalized_number;
        }

        self.broadcast(ChainEvent::FinalizedL1 { block }).await;
        block.number
    }

    /// Handles a new latest block: extends the history, fills gaps and detects reorgs.
    pub(crate) async fn handle_new_latest_block(
        &self,
        block: BlockRef,
        history: &mut L1History,
    ) -> Result<(), L1WatcherError> {
        let Some(head) = history.head() else {
            info!(target: "supervisor::l1_watcher", %block, "First L1 block observed");
            history.push(block);
            self.broadcast(ChainEvent::NewL1Block { block }).await;
            return Ok(());
        };

        if history.get(block.number) == Some(block) {
            trace!(
                target: "supervisor::l1_watcher",
                block_number = block.number,
                "L1 block already known"
            );
            return Ok(());
        }

        for number in head.number + 1..block.number {
            let missing = self.fetch_block(number).await?;
            self.append(missing, history).await?;
        }
        self.append(block, history).await
    }

    /// Appends `block` to the history, going through a reorg if it does not extend the head.
    async fn append(&self, block: BlockRef, history: &mut L1History) -> Result<(), L1WatcherError> {
        if let Some(head) = history.head() {
            if head == block {
                return Ok(());
            }
            if !head.is_parent_of(&block) {
                self.reorg(block, history).await?;
            }
        }

        trace!(target: "supervisor::l1_watcher", block_number = block.number, "New L1 block");
        history.push(block);
        self.broadcast(ChainEvent::NewL1Block { block }).await;
        Ok(())
    }

    /// Rolls the history back to the common ancestor with the chain `block` is on, reports the
    /// reorg and reports the new chain up to the parent of `block`.
    async fn reorg(&self, block: BlockRef, history: &mut L1History) -> Result<(), L1WatcherError> {
        let ancestor = self.find_common_ancestor(&block, history).await?;

        warn!(
            target: "supervisor::l1_watcher",
            %block,
            ancestor = ancestor.number,
            "L1 reorg detected"
        );
        history.truncate_above(ancestor.number);
        if history.head() != Some(ancestor) {
            // deeper than the history
            history.blocks.clear();
            history.push(ancestor);
        }
        self.broadcast(ChainEvent::L1Reorg { ancestor: ancestor.id() }).await;

        let mut parent = ancestor;
        for number in ancestor.number + 1..block.number {
            let next = self.fetch_block(number).await?;
            if !parent.is_parent_of(&next) {
                return Err(L1WatcherError::Inconsistent(next.number));
            }
            history.push(next);
            self.broadcast(ChainEvent::NewL1Block { block: next }).await;
            parent = next;
        }
        if !parent.is_parent_of(&block) {
            return Err(L1WatcherError::Inconsistent(block.number));
        }
        Ok(())
    }

    async fn find_common_ancestor(
        &self,
        block: &BlockRef,
        history: &L1History,
    ) -> Result<BlockRef, L1WatcherError> {
        for stored in history.blocks.iter().rev().filter(|stored| stored.number < block.number) {
            let canonical = if stored.is_parent_of(block) {
                true
            } else if stored.number + 1 == block.number {
                false
            } else {
                self.fetch_block(stored.number).await? == *stored
            };
            if canonical {
                return Ok(*stored);
            }
        }

        let oldest = history.blocks.front().map_or(block.number, |oldest| oldest.number);
        let below = self.fetch_block(oldest.min(block.number).saturating_sub(1)).await?;
        warn!(
            target: "supervisor::l1_watcher",
            ancestor = below.number,
            "L1 reorg deeper than the watcher's history"
        );
        Ok(below)
    }

    async fn fetch_block(&self, number: u64) -> Result<BlockRef, L1WatcherError> {
        let block = self
            .rpc_client
            .request::<_, Block>("eth_getBlockByNumber", (BlockNumberOrTag::Number(number), false))
            .await
            .map_err(|err| L1WatcherError::Rpc {
                block: number.to_string(),
                reason: err.to_string(),
            })?;
        Ok(block_ref(&block.header))
    }

    async fn broadcast(&self, event: ChainEvent) {
        for (chain_id, sender) in &self.event_txs {
            if let Err(err) = sender.send(event.clone()).await {
                error!(
                    target: "supervisor::l1_watcher",
                    chain_id = %chain_id,
                    %err,
                    "Failed to send L1 event"
                );
            }
        }
    }
}

fn block_ref(header: &Header) -> BlockRef {
    BlockRef::new(header.hash, header.number, header.parent_hash, header.timestamp)
}
