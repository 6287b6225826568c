use crate::{
    CrossSafetyError,
    safety_checker::{ValidationError, ValidationError::InitiatingMessageNotFound},
};
use alloy_primitives::{BlockHash, ChainId};
use derive_more::Constructor;
use interop_supervisor_storage::{CrossChainSafetyProvider, StorageError};
use interop_supervisor_types::{BlockRef, ExecutingMessage, InteropValidator, Log, SafetyLevel};
use std::collections::HashSet;

/// Uses a [`CrossChainSafetyProvider`] to verify the safety of cross-chain message dependencies.
///
/// Every read goes through committed storage of the dependency chains. Nothing that is still in
/// flight on another chain's event channel is ever looked at.
#[derive(Debug, Constructor)]
pub struct CrossSafetyChecker<'a, P, V> {
    chain_id: ChainId,
    validator: &'a V,
    provider: &'a P,
    required_level: SafetyLevel,
}

impl<P, V> CrossSafetyChecker<'_, P, V>
where
    P: CrossChainSafetyProvider,
    V: InteropValidator,
{
    /// Verifies that all executing messages in the given block are valid and that every message
    /// they execute is at the required safety level.
    ///
    /// A block without executing messages passes trivially.
    pub fn validate_block(&self, block: BlockRef) -> Result<(), CrossSafetyError> {
        let logs = self.provider.get_block_logs(self.chain_id, block.number)?;

        for log in &logs {
            let Some(message) = log.executing_message else { continue };

            self.validator
                .validate_interop_timestamps(
                    message.chain_id,  // initiating chain id
                    message.timestamp, // initiating block timestamp
                    self.chain_id,     // executing chain id
                    block.timestamp,   // executing block timestamp
                    None,
                )
                .map_err(ValidationError::InteropValidationError)?;

            if message.chain_id == self.chain_id && message.block_number >= block.number {
                if message.block_number > block.number {
                    return Err(InitiatingMessageNotFound.into());
                }
                self.validate_same_block_message(&block, &logs, log.index, &message)?;
                continue;
            }

            let initiating_block = self.verify_message_dependency(&block, &message)?;
            self.validate_executing_message(initiating_block, &message)?;
        }

        Ok(())
    }

    /// Ensures that the block a message depends on satisfies the required safety level and
    /// returns it.
    ///
    /// A dependency that is not there yet defers the check, unless waiting for it could never
    /// succeed because it depends back on the candidate.
    fn verify_message_dependency(
        &self,
        candidate: &BlockRef,
        message: &ExecutingMessage,
    ) -> Result<BlockRef, CrossSafetyError> {
        let head = match self.provider.get_safety_head_ref(message.chain_id, self.required_level) {
            Ok(head) => Some(head),
            Err(StorageError::FutureData) => None,
            Err(StorageError::DatabaseNotInitialised) => {
                return Err(ValidationError::UnknownChain(message.chain_id).into());
            }
            Err(err) => return Err(err.into()),
        };

        if head.is_some_and(|head| head.number >= message.block_number) {
            return self.provider.get_block(message.chain_id, message.block_number).map_err(
                |err| -> CrossSafetyError {
                    match err {
                        StorageError::EntryNotFound(_) => InitiatingMessageNotFound.into(),
                        other => other.into(),
                    }
                },
            );
        }

        if let Some(initiating_block) = self.find_block(message.chain_id, message.block_number)? {
            self.check_cyclic_dependency(
                candidate,
                &initiating_block,
                message.chain_id,
                &mut HashSet::new(),
            )?;
        }

        Err(CrossSafetyError::DependencyNotSafe {
            chain_id: message.chain_id,
            block_number: message.block_number,
        })
    }

    /// Recursively checks whether the dependencies of `current` lead back to `candidate`.
    ///
    /// Only blocks with the candidate's timestamp can form a cycle, and only blocks below the
    /// required level are followed. A cycle not involving the candidate is left to the checker of
    /// the chain it belongs to.
    ///
    /// Example:
    /// - A (candidate) → B → C → A: cycle
    /// - A → B → C → D: no cycle
    /// - A → B → C → B: ignored here
    fn check_cyclic_dependency(
        &self,
        candidate: &BlockRef,
        current: &BlockRef,
        chain_id: ChainId,
        visited: &mut HashSet<(ChainId, BlockHash)>,
    ) -> Result<(), CrossSafetyError> {
        if candidate.timestamp != current.timestamp {
            return Ok(());
        }

        if !visited.insert((chain_id, current.hash)) {
            return Ok(());
        }

        if candidate.hash == current.hash && self.chain_id == chain_id {
            return Err(ValidationError::CyclicDependency { block: *candidate }.into());
        }

        match self.provider.get_safety_head_ref(chain_id, self.required_level) {
            Ok(head) if head.number >= current.number => return Ok(()),
            Ok(_) | Err(StorageError::FutureData) => {}
            Err(err) => return Err(err.into()),
        }

        for log in self.provider.get_block_logs(chain_id, current.number)? {
            let Some(message) = log.executing_message else { continue };
            if let Some(origin) = self.find_block(message.chain_id, message.block_number)? {
                self.check_cyclic_dependency(candidate, &origin, message.chain_id, visited)?;
            }
        }
        Ok(())
    }

    fn validate_executing_message(
        &self,
        init_block: BlockRef,
        message: &ExecutingMessage,
    ) -> Result<(), CrossSafetyError> {
        if init_block.timestamp != message.timestamp {
            return Err(ValidationError::TimestampInvariantViolation {
                expected_timestamp: init_block.timestamp,
                actual_timestamp: message.timestamp,
            }
            .into());
        }

        let init_msg = self
            .provider
            .get_log(message.chain_id, message.block_number, message.log_index)
            .map_err(|err| match err {
                StorageError::EntryNotFound(_) => {
                    CrossSafetyError::ValidationError(InitiatingMessageNotFound)
                }
                other => other.into(),
            })?;

        // Comparing the hash covers every field of the identifier already checked above.
        if init_msg.hash != message.hash {
            return Err(ValidationError::InvalidMessageHash {
                message_hash: message.hash,
                original_hash: init_msg.hash,
            }
            .into());
        }

        Ok(())
    }

    /// Validates a message initiated earlier in the same block it is executed in.
    fn validate_same_block_message(
        &self,
        block: &BlockRef,
        logs: &[Log],
        executing_index: u32,
        message: &ExecutingMessage,
    ) -> Result<(), CrossSafetyError> {
        if message.log_index >= executing_index {
            return Err(ValidationError::InvalidLogOrder {
                executing: executing_index,
                initiating: message.log_index,
            }
            .into());
        }

        if block.timestamp != message.timestamp {
            return Err(ValidationError::TimestampInvariantViolation {
                expected_timestamp: block.timestamp,
                actual_timestamp: message.timestamp,
            }
            .into());
        }

        let initiating = logs
            .iter()
            .find(|log| log.index == message.log_index)
            .ok_or(InitiatingMessageNotFound)?;
        if initiating.hash != message.hash {
            return Err(ValidationError::InvalidMessageHash {
                message_hash: message.hash,
                original_hash: initiating.hash,
            }
            .into());
        }

        Ok(())
    }

    fn find_block(
        &self,
        chain_id: ChainId,
        number: u64,
    ) -> Result<Option<BlockRef>, CrossSafetyError> {
        match self.provider.get_block(chain_id, number) {
            Ok(block) => Ok(Some(block)),
            Err(StorageError::EntryNotFound(_) | StorageError::FutureData) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
