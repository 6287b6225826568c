use crate::event::ChainEvent;
use alloy_eips::BlockNumHash;
use interop_supervisor_types::BlockRef;
use std::collections::VecDeque;

/// Most events kept for replay while a chain is suspended. Past it the oldest are dropped.
pub const MAX_DEFERRED_EVENTS: usize = 1024;

/// An L1 reorg being reconciled for the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suspension {
    /// Highest L1 block known to be canonical.
    pub l1_ancestor: BlockNumHash,
    /// A deeper reorg arrived while this one was in flight; it has to be started over.
    pub restart_pending: bool,
}

/// In-memory state a chain processor carries between events.
///
/// Nothing here is persisted: after a restart the processor starts unsuspended and the node
/// re-emits what is needed.
#[derive(Debug, Default)]
pub struct ProcessorState {
    suspension: Option<Suspension>,
    deferred: VecDeque<ChainEvent>,
    awaiting_l1: Option<u64>,
    invalidated: Option<BlockRef>,
    finalized_l1: Option<BlockRef>,
    last_finalized: Option<BlockRef>,
}

impl ProcessorState {
    /// Creates a new instance of [`ProcessorState`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while an L1 reorg is being reconciled.
    pub const fn is_suspended(&self) -> bool {
        self.suspension.is_some()
    }

    /// Returns the reorg being reconciled, if any.
    pub const fn suspension(&self) -> Option<Suspension> {
        self.suspension
    }

    /// Suspends promotion for a reorg down to `l1_ancestor`.
    ///
    /// Returns `true` if the reorg handler has to be started. While suspended, a deeper ancestor
    /// replaces the current one and marks the reorg for restart; a shallower one is already
    /// covered.
    pub fn suspend(&mut self, l1_ancestor: BlockNumHash) -> bool {
        match &mut self.suspension {
            None => {
                self.suspension = Some(Suspension { l1_ancestor, restart_pending: false });
                true
            }
            Some(current) => {
                if l1_ancestor.number < current.l1_ancestor.number {
                    current.l1_ancestor = l1_ancestor;
                    current.restart_pending = true;
                }
                false
            }
        }
    }

    /// Takes the pending restart, returning the ancestor to restart from.
    pub fn take_restart(&mut self) -> Option<BlockNumHash> {
        let current = self.suspension.as_mut()?;
        if !current.restart_pending {
            return None;
        }
        current.restart_pending = false;
        Some(current.l1_ancestor)
    }

    /// Ends the suspension, returning its ancestor and the events deferred during it.
    pub fn resume(&mut self) -> Option<(BlockNumHash, Vec<ChainEvent>)> {
        let suspension = self.suspension.take()?;
        Some((suspension.l1_ancestor, std::mem::take(&mut self.deferred).into()))
    }

    /// Keeps an event for replay after the suspension ends. Returns the oldest deferred event if
    /// it had to be dropped to stay within [`MAX_DEFERRED_EVENTS`].
    pub fn defer(&mut self, event: ChainEvent) -> Option<ChainEvent> {
        let dropped =
            if self.deferred.len() >= MAX_DEFERRED_EVENTS { self.deferred.pop_front() } else { None };
        self.deferred.push_back(event);
        dropped
    }

    /// Number of deferred events.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Remembers that the node waits for L1 block `number`.
    pub const fn await_l1(&mut self, number: u64) {
        self.awaiting_l1 = Some(number);
    }

    /// Takes the awaited L1 block number if it is `number`.
    pub fn take_awaiting_l1(&mut self, number: u64) -> bool {
        if self.awaiting_l1 == Some(number) {
            self.awaiting_l1 = None;
            return true;
        }
        false
    }

    /// Forgets the awaited L1 block.
    pub const fn clear_awaiting_l1(&mut self) {
        self.awaiting_l1 = None;
    }

    /// Returns the block the node was asked to replace, while its replacement is outstanding.
    pub const fn invalidated(&self) -> Option<BlockRef> {
        self.invalidated
    }

    /// Remembers that `block` was invalidated and the node has to replace it.
    pub const fn set_invalidated(&mut self, block: BlockRef) {
        self.invalidated = Some(block);
    }

    /// Clears the pending invalidation if `invalidated` is the block it waits on. Returns `true`
    /// if it was cleared.
    pub fn take_invalidated(&mut self, invalidated: BlockNumHash) -> bool {
        if self.invalidated.is_some_and(|block| block.id() == invalidated) {
            self.invalidated = None;
            return true;
        }
        false
    }

    /// Forgets the pending invalidation if the block is above `number`.
    pub fn clear_invalidated_above(&mut self, number: u64) {
        if self.invalidated.is_some_and(|block| block.number > number) {
            self.invalidated = None;
        }
    }

    /// Returns the latest finalized L1 block seen.
    pub const fn finalized_l1(&self) -> Option<BlockRef> {
        self.finalized_l1
    }

    /// Records the latest finalized L1 block.
    pub const fn set_finalized_l1(&mut self, block: BlockRef) {
        self.finalized_l1 = Some(block);
    }

    /// Records the finalized L2 block pushed to the node. Returns `false` if it was already
    /// pushed.
    pub fn set_last_finalized(&mut self, block: BlockRef) -> bool {
        if self.last_finalized == Some(block) {
            return false;
        }
        self.last_finalized = Some(block);
        true
    }

    /// Drops everything, keeping the latest finalized L1 block.
    pub fn reset(&mut self) {
        *self = Self { finalized_l1: self.finalized_l1, ..Self::default() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn id(number: u64) -> BlockNumHash {
        BlockNumHash { number, hash: B256::repeat_byte(number as u8) }
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut state = ProcessorState::new();
        assert!(state.suspend(id(45)));
        assert!(state.is_suspended());

        let event = ChainEvent::FinalizedL1 { block: BlockRef::default() };
        assert_eq!(state.defer(event.clone()), None);

        let (ancestor, deferred) = state.resume().unwrap();
        assert_eq!(ancestor, id(45));
        assert_eq!(deferred, vec![event]);
        assert!(!state.is_suspended());
        assert_eq!(state.deferred_len(), 0);
    }

    #[test]
    fn test_deferred_events_are_bounded() {
        let mut state = ProcessorState::new();
        state.suspend(id(45));

        let finalized = |number| ChainEvent::FinalizedL1 {
            block: BlockRef::new(B256::ZERO, number, B256::ZERO, 0),
        };
        for number in 0..MAX_DEFERRED_EVENTS as u64 {
            assert_eq!(state.defer(finalized(number)), None);
        }
        assert_eq!(state.defer(finalized(MAX_DEFERRED_EVENTS as u64)), Some(finalized(0)));
        assert_eq!(state.deferred_len(), MAX_DEFERRED_EVENTS);

        let (_, deferred) = state.resume().unwrap();
        assert_eq!(deferred.first(), Some(&finalized(1)));
        assert_eq!(deferred.last(), Some(&finalized(MAX_DEFERRED_EVENTS as u64)));
    }

    #[test]
    fn test_invalidation_cleared_by_matching_replacement_only() {
        let mut state = ProcessorState::new();
        let block = BlockRef::new(B256::repeat_byte(9), 9, B256::repeat_byte(8), 0);
        state.set_invalidated(block);

        assert!(!state.take_invalidated(BlockNumHash { number: 9, hash: B256::ZERO }));
        assert_eq!(state.invalidated(), Some(block));

        state.clear_invalidated_above(9);
        assert_eq!(state.invalidated(), Some(block));

        assert!(state.take_invalidated(block.id()));
        assert_eq!(state.invalidated(), None);

        state.set_invalidated(block);
        state.clear_invalidated_above(8);
        assert_eq!(state.invalidated(), None);
    }

    #[test]
    fn test_deeper_reorg_marks_restart() {
        let mut state = ProcessorState::new();
        assert!(state.suspend(id(45)));

        // shallower reorg is covered by the one in flight
        assert!(!state.suspend(id(47)));
        assert_eq!(state.take_restart(), None);

        assert!(!state.suspend(id(40)));
        assert_eq!(state.take_restart(), Some(id(40)));
        assert_eq!(state.take_restart(), None);
        assert_eq!(state.suspension().unwrap().l1_ancestor, id(40));
    }

    #[test]
    fn test_awaiting_l1() {
        let mut state = ProcessorState::new();
        state.await_l1(11);
        assert!(!state.take_awaiting_l1(10));
        assert!(state.take_awaiting_l1(11));
        assert!(!state.take_awaiting_l1(11));
    }

    #[test]
    fn test_reset_keeps_finalized_l1() {
        let mut state = ProcessorState::new();
        let finalized = BlockRef::new(B256::repeat_byte(1), 9, B256::ZERO, 0);
        state.set_finalized_l1(finalized);
        assert!(state.set_last_finalized(BlockRef::default()));
        assert!(!state.set_last_finalized(BlockRef::default()));
        state.suspend(id(3));

        state.reset();
        assert!(!state.is_suspended());
        assert_eq!(state.finalized_l1(), Some(finalized));
        assert!(state.set_last_finalized(BlockRef::default()));
    }
}
