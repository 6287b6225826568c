//! Core types shared across supervisor components.
//!
//! Block references, safety levels, indexed logs and interop messages, plus the payloads
//! exchanged with managed nodes.

mod block;
pub use block::{BlockRef, L2BlockRef};

mod safety;
pub use safety::{SafetyLevel, SafetyLevelParseError};

mod derived;
pub use derived::{DerivedIdPair, DerivedRefPair};

pub mod head;
pub use head::SuperHead;

mod log;
pub use log::Log;

mod message;
pub use message::{
    CROSS_L2_INBOX_ADDRESS, ExecutingDescriptor, ExecutingMessage, ExecutingMessageEvent,
    MessageIdentifier, log_hash, payload_hash_to_log_hash,
};

mod access_list;
pub use access_list::{Access, AccessListError, parse_access_list};

mod output;
pub use output::{OutputRootWithChain, OutputV0, SUPER_ROOT_VERSION, SuperRoot};

mod event;
pub use event::{BlockReplacement, BlockSeal, ManagedEvent, SubscriptionEvent};

mod node;
pub use node::{NodeSelf, NodeSyncStatus, PeerDump, PeerInfo};

mod dependency;
pub use dependency::{ChainDependency, DependencySet, MESSAGE_EXPIRY_WINDOW};

mod validator;
pub use validator::{InteropValidationError, InteropValidator};

mod hex_string_u64;
pub use hex_string_u64::HexStringU64;

/// Receipts of every transaction in a block.
pub type Receipts = Vec<op_alloy_consensus::OpReceiptEnvelope>;
